use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use calorie_common::openai::OpenAiClientError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    BadRequest(String),

    /// The body could not be read as the expected JSON. Oversized bodies keep
    /// their 413; every other rejection is a 400.
    #[error("Invalid request body")]
    InvalidBody { status: StatusCode, details: String },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("AI analysis is disabled")]
    AnalysisDisabled,

    #[error("OpenAI API key not configured")]
    MissingApiKey,

    #[error("Configuration not available")]
    ClientConfigUnavailable,

    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: OpenAiClientError,
    },
}

/// JSON error body: `{"error": "...", "details": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBody { status, .. } => *status,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::AnalysisDisabled | Self::ClientConfigUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Config(_) | Self::MissingApiKey | Self::Upstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::MissingApiKey => ErrorBody {
                error: self.to_string(),
                details: Some("Please set the OPENAI_API_KEY environment variable".to_string()),
            },
            Self::InvalidBody { details, .. } => ErrorBody {
                error: self.to_string(),
                details: Some(details.clone()),
            },
            Self::Upstream { context, source } => ErrorBody {
                error: (*context).to_string(),
                details: Some(source.to_string()),
            },
            _ => ErrorBody {
                error: self.to_string(),
                details: None,
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::InvalidBody {
            status,
            details: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_keep_context_and_details() {
        let err = AppError::Upstream {
            context: "Failed to analyze image",
            source: OpenAiClientError::NoChoices,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Failed to analyze image");
        assert_eq!(body["details"], "completion returned no choices");
    }

    #[test]
    fn client_errors_have_no_details() {
        let err = AppError::BadRequest("No image provided".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "No image provided" }));
    }

    #[test]
    fn invalid_body_carries_the_parser_message() {
        let err = AppError::InvalidBody {
            status: StatusCode::BAD_REQUEST,
            details: "expected value at line 1 column 2".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Invalid request body");
        assert_eq!(body["details"], "expected value at line 1 column 2");
    }
}
