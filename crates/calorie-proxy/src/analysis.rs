use std::sync::Arc;

use calorie_common::normalizer;
use calorie_common::nutrition::NutritionRecord;
use calorie_common::openai::{ChatCompletionRequest, OpenAiClient, OpenAiClientError};
use calorie_common::prompt::{PromptTemplates, PromptVariant};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

/// Body of `POST /api/analyze-photo`, as sent by the web and mobile clients.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Base64 JPEG, either bare or as a `data:image/...;base64,` URL.
    pub image: Option<String>,
    pub food_description: Option<String>,
    /// `"text"` selects description analysis; anything else means image.
    pub analysis_type: Option<String>,
}

/// What to send upstream, resolved from an [`AnalyzeRequest`].
#[derive(Debug, PartialEq, Eq)]
pub enum AnalysisInput {
    Image { base64: String },
    Text { description: String },
}

impl AnalyzeRequest {
    pub fn into_input(self) -> Result<AnalysisInput, AppError> {
        if self.analysis_type.as_deref() == Some("text") {
            if let Some(description) = non_empty(self.food_description) {
                return Ok(AnalysisInput::Text { description });
            }
        }

        let image = non_empty(self.image)
            .ok_or_else(|| AppError::BadRequest("No image provided".to_string()))?;
        Ok(AnalysisInput::Image {
            base64: strip_data_url(&image).to_string(),
        })
    }
}

/// Only the empty string counts as absent; whitespace is sent upstream as-is.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `data:image/png;base64,AAAA` -> `AAAA`; anything else is returned unchanged.
fn strip_data_url(image: &str) -> &str {
    if image.starts_with("data:image/") {
        if let Some((_, payload)) = image.split_once(',') {
            return payload;
        }
    }
    image
}

/// Sends one prompt upstream and normalizes whatever comes back.
#[derive(Clone)]
pub struct Analyzer {
    openai: Arc<OpenAiClient>,
    prompts: PromptTemplates,
    model: String,
    max_tokens: u32,
}

impl Analyzer {
    pub fn new(
        openai: Arc<OpenAiClient>,
        prompts: PromptTemplates,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            openai,
            prompts,
            model,
            max_tokens,
        }
    }

    pub async fn analyze(&self, input: AnalysisInput) -> Result<NutritionRecord, AppError> {
        let (messages, variant, context) = match input {
            AnalysisInput::Image { base64 } => (
                self.prompts.image_messages(&base64),
                PromptVariant::Image,
                "Failed to analyze image",
            ),
            AnalysisInput::Text { description } => (
                self.prompts.text_messages(&description),
                PromptVariant::Text { description },
                "Failed to analyze food description",
            ),
        };

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
        };
        let reply = self
            .openai
            .complete_text(&request)
            .await
            .map_err(|e| match e {
                OpenAiClientError::MissingApiKey => AppError::MissingApiKey,
                source => AppError::Upstream { context, source },
            })?;

        info!(
            variant = variant.as_str(),
            model = %self.model,
            reply_chars = reply.text.chars().count(),
            prompt_tokens = reply.usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens = reply.usage.as_ref().and_then(|u| u.completion_tokens),
            total_tokens = reply.usage.as_ref().and_then(|u| u.total_tokens),
            "completion received"
        );
        Ok(normalizer::normalize(&reply.text, &variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(image: Option<&str>, description: Option<&str>, kind: Option<&str>) -> AnalyzeRequest {
        AnalyzeRequest {
            image: image.map(str::to_string),
            food_description: description.map(str::to_string),
            analysis_type: kind.map(str::to_string),
        }
    }

    #[test]
    fn text_type_with_description_selects_text() {
        let input = request(None, Some("2 eggs"), Some("text")).into_input().unwrap();
        assert_eq!(
            input,
            AnalysisInput::Text {
                description: "2 eggs".to_string()
            }
        );
    }

    #[test]
    fn text_type_without_description_falls_through_to_image() {
        for description in [None, Some("")] {
            let input = request(Some("QUJD"), description, Some("text")).into_input().unwrap();
            assert_eq!(
                input,
                AnalysisInput::Image {
                    base64: "QUJD".to_string()
                }
            );
        }
    }

    #[test]
    fn whitespace_description_still_selects_text() {
        let input = request(None, Some("  "), Some("text")).into_input().unwrap();
        assert_eq!(
            input,
            AnalysisInput::Text {
                description: "  ".to_string()
            }
        );
    }

    #[test]
    fn description_without_text_type_is_ignored() {
        let err = request(None, Some("2 eggs"), None).into_input().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn missing_image_is_bad_request() {
        let err = request(Some(""), None, Some("image")).into_input().unwrap_err();
        assert_eq!(err.to_string(), "No image provided");
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let input = request(Some("data:image/png;base64,iVBOR"), None, None)
            .into_input()
            .unwrap();
        assert_eq!(
            input,
            AnalysisInput::Image {
                base64: "iVBOR".to_string()
            }
        );
        assert_eq!(strip_data_url("data:text/plain,hi"), "data:text/plain,hi");
        assert_eq!(strip_data_url("data:image/jpeg;base64"), "data:image/jpeg;base64");
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body: AnalyzeRequest = serde_json::from_str(
            r#"{"foodDescription": "toast", "analysisType": "text"}"#,
        )
        .unwrap();
        assert_eq!(body.food_description.as_deref(), Some("toast"));
        assert_eq!(body.analysis_type.as_deref(), Some("text"));
        assert!(body.image.is_none());
    }
}
