//! Prompt variants and the default instruction templates sent upstream.

use crate::openai::{ContentPart, Message, MessageContent};

pub const DEFAULT_IMAGE_PROMPT: &str = "Analyze this food image and provide detailed nutrition \
information. Return a JSON object with: foods array (each with name, portion_size, calories, \
protein, carbs, fat, fiber, sugar, sodium, confidence), total_calories, and notes.";

pub const DEFAULT_TEXT_PROMPT: &str = r#"You are a nutrition expert. Analyze the food description and provide detailed nutritional information in JSON format.

IMPORTANT: If the input contains multiple ingredients or foods (like a list or recipe), create a SEPARATE entry in the "foods" array for EACH individual ingredient/food item. Do not combine them into one entry.

Return ONLY a JSON object with this exact structure:
{
  "foods": [
    {
      "name": "Food Name",
      "portion_size": "portion description",
      "calories": number,
      "protein": number,
      "carbs": number,
      "fat": number,
      "fiber": number,
      "sugar": number,
      "sodium": number,
      "confidence": number (0-100)
    }
  ],
  "total_calories": number,
  "notes": "brief analysis notes"
}

Examples:
- Input: "1 egg, 50g yogurt, 1 slice bread" -> Create 3 separate food entries
- Input: "salad with lettuce, tomatoes, cucumbers" -> Create 3 separate food entries
- Input: "chicken breast with rice and broccoli" -> Create 3 separate food entries

Be accurate with nutritional values based on standard food databases."#;

/// Which prompt produced a model reply. Selects the fallback record the
/// normalizer synthesizes when the reply cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptVariant {
    /// A photo analysed with the vision prompt.
    Image,
    /// A free-text meal description.
    Text { description: String },
}

impl PromptVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text { .. } => "text",
        }
    }
}

/// Instruction texts for both variants. Defaults are the built-in prompts;
/// deployments may override either one.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub image: String,
    pub text: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_PROMPT.to_string(),
            text: DEFAULT_TEXT_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Build the chat messages for a photo. `image_base64` is the bare base64
    /// payload (no `data:` prefix).
    pub fn image_messages(&self, image_base64: &str) -> Vec<Message> {
        vec![Message {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::text(&self.image),
                ContentPart::image_url(format!("data:image/jpeg;base64,{image_base64}")),
            ]),
        }]
    }

    /// Build the chat messages for a text description.
    pub fn text_messages(&self, description: &str) -> Vec<Message> {
        vec![
            Message::text("system", &self.text),
            Message::text(
                "user",
                format!(
                    "Analyze this food description and provide nutritional information. If this \
is a list of ingredients or multiple foods, create separate entries for each item: \"{description}\""
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_messages_embed_a_jpeg_data_url() {
        let messages = PromptTemplates::default().image_messages("QUJD");
        assert_eq!(messages.len(), 1);
        let json = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn text_messages_quote_the_description() {
        let templates = PromptTemplates {
            image: String::new(),
            text: "be a nutritionist".to_string(),
        };
        let messages = templates.text_messages("2 eggs, toast");
        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "be a nutritionist");
        assert_eq!(json[1]["role"], "user");
        assert!(json[1]["content"].as_str().unwrap().ends_with("\"2 eggs, toast\""));
    }
}
