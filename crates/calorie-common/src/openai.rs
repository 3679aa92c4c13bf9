use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    /// Bearer token. `None` means every completion call fails fast with
    /// [`OpenAiClientError::MissingApiKey`].
    pub api_key: Option<String>,
    pub default_timeout: Duration,
    pub max_error_body_bytes: usize,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            default_timeout: Duration::from_secs(60),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("OpenAI API key not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("completion returned no choices")]
    NoChoices,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// Each call is a single attempt; failures are returned to the caller as-is.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(mut config: OpenAiClientConfig) -> Result<Self, OpenAiClientError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .user_agent("calorie-proxy")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(OpenAiClientError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(url = %url, model = %request.model, "sending chat completion");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.config.default_timeout)
            .json(request)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    /// Run a completion and return the first choice's text. A choice without
    /// content yields an empty string.
    pub async fn complete_text(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<CompletionText, OpenAiClientError> {
        let response = self.chat_completions(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(OpenAiClientError::NoChoices)?;
        Ok(CompletionText {
            text: choice.message.content.unwrap_or_default(),
            usage: response.usage,
        })
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, OpenAiClientError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice::<T>(&bytes)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> OpenAiClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return OpenAiClientError::Upstream { status, message };
        }
        OpenAiClientError::UpstreamBody { status, body }
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorObject,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorObject {
    message: Option<String>,
}

/// Text of the first completion choice plus whatever usage the upstream reported.
#[derive(Debug, Clone)]
pub struct CompletionText {
    pub text: String,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Message body: plain text, or a list of typed parts for vision requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use axum::{http::HeaderMap, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String, api_key: Option<&str>) -> OpenAiClient {
        OpenAiClient::new(OpenAiClientConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            default_timeout: Duration::from_secs(5),
            max_error_body_bytes: 16,
        })
        .unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::text("user", "hi")],
            max_tokens: Some(10),
        }
    }

    #[tokio::test]
    async fn complete_text_sends_bearer_and_returns_first_choice() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "gpt-4o");
                assert_eq!(body["max_tokens"], 10);
                assert_eq!(body.as_object().unwrap().len(), 3, "unexpected fields: {body}");
                Json(json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": "hello" },
                        "finish_reason": "stop"
                    }],
                    "usage": { "total_tokens": 12 }
                }))
            }),
        );
        let base = spawn_upstream(router).await;

        let reply = client(format!("{base}/"), Some("sk-test"))
            .complete_text(&request())
            .await
            .unwrap();
        assert_eq!(reply.text, "hello");
        assert_eq!(reply.usage.and_then(|u| u.total_tokens), Some(12));
    }

    #[tokio::test]
    async fn null_content_is_empty_text() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [{ "message": { "content": null } }] })) }),
        );
        let base = spawn_upstream(router).await;
        let reply = client(base, Some("k")).complete_text(&request()).await.unwrap();
        assert_eq!(reply.text, "");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = spawn_upstream(router).await;
        let err = client(base, Some("k")).complete_text(&request()).await.unwrap_err();
        assert!(matches!(err, OpenAiClientError::NoChoices));
    }

    #[tokio::test]
    async fn upstream_error_envelope_is_surfaced() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "bad key" } })),
                )
            }),
        );
        let base = spawn_upstream(router).await;
        let err = client(base, Some("k")).complete_text(&request()).await.unwrap_err();
        match err {
            OpenAiClientError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_truncated() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (AxumStatus::BAD_GATEWAY, "x".repeat(100)) }),
        );
        let base = spawn_upstream(router).await;
        let err = client(base, Some("k")).complete_text(&request()).await.unwrap_err();
        match err {
            OpenAiClientError::UpstreamBody { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body.len(), 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_a_request() {
        let err = client("http://127.0.0.1:9/v1".to_string(), None)
            .complete_text(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, OpenAiClientError::MissingApiKey));
    }
}
