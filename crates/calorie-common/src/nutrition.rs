use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_FOOD_NAME: &str = "Unknown Food";
pub const DEFAULT_PORTION_SIZE: &str = "1 serving";
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Nutrition breakdown for one analyzed meal, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    /// Food items in the order the model listed them.
    pub foods: Vec<FoodItem>,
    /// Meal total reported by the model (not recomputed from `foods`).
    pub total_calories: f64,
    /// Free-form observations, or the diagnostic text of a fallback record.
    pub notes: String,
}

/// A single food item within a [`NutritionRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    /// Food name, e.g. "Grilled chicken breast"
    pub name: String,
    /// Portion description, e.g. "150g", "1 cup"
    pub portion_size: String,
    pub calories: f64,
    /// Grams
    pub protein: f64,
    /// Grams
    pub carbs: f64,
    /// Grams
    pub fat: f64,
    /// Grams
    pub fiber: f64,
    /// Grams
    pub sugar: f64,
    /// Milligrams
    pub sodium: f64,
    /// Model confidence, 0-100.
    pub confidence: f64,
}

impl Default for FoodItem {
    fn default() -> Self {
        Self {
            name: DEFAULT_FOOD_NAME.to_string(),
            portion_size: DEFAULT_PORTION_SIZE.to_string(),
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            fiber: 0.0,
            sugar: 0.0,
            sodium: 0.0,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl NutritionRecord {
    /// Coerce an arbitrary JSON object into a fully-typed record.
    ///
    /// Never fails: a missing or non-array `foods` becomes empty, and every
    /// missing or non-coercible field takes its default. Both snake_case and
    /// camelCase keys are accepted.
    pub fn from_json_object(obj: &Map<String, Value>) -> Self {
        let foods = match obj.get("foods") {
            Some(Value::Array(items)) => items.iter().map(FoodItem::from_json_value).collect(),
            _ => Vec::new(),
        };

        Self {
            foods,
            total_calories: coerce_number(field(obj, "total_calories", "totalCalories"))
                .unwrap_or(0.0),
            notes: coerce_string(obj.get("notes")).unwrap_or_default(),
        }
    }
}

impl FoodItem {
    /// Coerce one element of a `foods` array. Non-object elements yield an
    /// all-default item.
    pub fn from_json_value(value: &Value) -> Self {
        let Value::Object(obj) = value else {
            return Self::default();
        };
        let number = |key: &str| coerce_number(obj.get(key)).unwrap_or(0.0);

        Self {
            name: coerce_string(obj.get("name")).unwrap_or_else(|| DEFAULT_FOOD_NAME.to_string()),
            portion_size: coerce_string(field(obj, "portion_size", "portionSize"))
                .unwrap_or_else(|| DEFAULT_PORTION_SIZE.to_string()),
            calories: number("calories"),
            protein: number("protein"),
            carbs: number("carbs"),
            fat: number("fat"),
            fiber: number("fiber"),
            sugar: number("sugar"),
            sodium: number("sodium"),
            confidence: coerce_number(obj.get("confidence"))
                .unwrap_or(DEFAULT_CONFIDENCE)
                .clamp(0.0, 100.0),
        }
    }
}

fn field<'a>(obj: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a Value> {
    obj.get(snake).or_else(|| obj.get(camel))
}

/// Numeric coercion in the spirit of a loose `Number(x)`: numeric strings and
/// booleans convert, everything else is `None`.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

/// String coercion: falsy values (empty string, 0, false, null) and
/// containers are `None`.
fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => None,
            // Display drops the fraction of whole values: 1.0 -> "1".
            Some(f) if f.is_finite() => Some(f.to_string()),
            _ => Some(n.to_string()),
        },
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
