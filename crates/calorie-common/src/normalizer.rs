//! Turns a model's free-text reply into a [`NutritionRecord`].
//!
//! The reply is tried in order:
//! 1. the whole text as a JSON object
//! 2. the greedy `{ ... }` span (first `{` to last `}`), after stripping control
//!    characters and trailing commas
//! 3. a placeholder record chosen by [`PromptVariant`]
//!
//! The span extraction is a heuristic: prose containing braces, or several
//! JSON blocks in one reply, can widen the span into something unparsable, in
//! which case the placeholder is used.
//!
//! Parsing has no nesting limit: deep replies are handled on a growing stack.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::nutrition::{FoodItem, NutritionRecord, DEFAULT_PORTION_SIZE};
use crate::prompt::PromptVariant;

/// Maximum number of characters of the raw reply copied into fallback notes.
pub const RAW_EXCERPT_CHARS: usize = 200;

pub const IMAGE_FALLBACK_PREFIX: &str = "AI parsing failed. Raw response: ";
pub const TEXT_FALLBACK_PREFIX: &str = "AI parsing failed for text analysis. Raw response: ";

static JSON_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Normalize a completion reply. Never fails.
pub fn normalize(raw: &str, variant: &PromptVariant) -> NutritionRecord {
    match parse_reply(raw) {
        Ok(obj) => NutritionRecord::from_json_object(&obj),
        Err(reason) => {
            warn!(
                variant = variant.as_str(),
                reason = %reason,
                raw = raw,
                "could not parse model reply, using fallback record"
            );
            fallback_record(raw, variant)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ParseFailure {
    #[error("no JSON object found in reply")]
    NoJsonBlock,

    #[error("extracted block is not valid JSON: {0}")]
    InvalidBlock(#[from] serde_json::Error),

    #[error("extracted block is not a JSON object")]
    NotAnObject,
}

fn parse_reply(raw: &str) -> Result<Map<String, Value>, ParseFailure> {
    if let Ok(Value::Object(obj)) = parse_value(raw) {
        return Ok(obj);
    }
    debug!("reply is not a bare JSON object, extracting brace block");

    let block = JSON_BLOCK_RE
        .find(raw)
        .ok_or(ParseFailure::NoJsonBlock)?
        .as_str();
    match parse_value(&sanitize(block))? {
        Value::Object(obj) => Ok(obj),
        _ => Err(ParseFailure::NotAnObject),
    }
}

/// `serde_json::from_str` without the recursion limit.
fn parse_value(text: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Strip C0/C1 control characters and trailing commas before `}` or `]`.
fn sanitize(block: &str) -> String {
    let cleaned: String = block
        .chars()
        .filter(|c| !matches!(*c, '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}'))
        .collect();
    TRAILING_COMMA_RE.replace_all(&cleaned, "$1").into_owned()
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}

/// The placeholder record for a reply that could not be parsed. Image and text
/// analyses use different placeholder values.
pub fn fallback_record(raw: &str, variant: &PromptVariant) -> NutritionRecord {
    let (item, prefix) = match variant {
        PromptVariant::Image => (
            FoodItem {
                name: "Food Item".to_string(),
                portion_size: DEFAULT_PORTION_SIZE.to_string(),
                calories: 300.0,
                protein: 15.0,
                carbs: 30.0,
                fat: 12.0,
                fiber: 3.0,
                sugar: 5.0,
                sodium: 200.0,
                confidence: 75.0,
            },
            IMAGE_FALLBACK_PREFIX,
        ),
        PromptVariant::Text { description } => (
            FoodItem {
                name: fallback_name(description),
                portion_size: DEFAULT_PORTION_SIZE.to_string(),
                calories: 200.0,
                protein: 10.0,
                carbs: 25.0,
                fat: 8.0,
                fiber: 3.0,
                sugar: 5.0,
                sodium: 150.0,
                confidence: 50.0,
            },
            TEXT_FALLBACK_PREFIX,
        ),
    };

    NutritionRecord {
        total_calories: item.calories,
        foods: vec![item],
        notes: format!("{prefix}{}...", excerpt(raw)),
    }
}

/// "Chicken salad - large bowl" -> "Chicken salad"
fn fallback_name(description: &str) -> String {
    let head = description.split('-').next().unwrap_or_default().trim();
    if head.is_empty() {
        "Food Item".to_string()
    } else {
        head.to_string()
    }
}
