use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use calorie_common::openai::{OpenAiClientConfig, DEFAULT_BASE_URL};
use calorie_common::prompt::PromptTemplates;

use crate::error::AppError;

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Application configuration loaded explicitly from environment variables.
///
/// Everything has a default except the upstream API key and the storage
/// credentials. Without an API key the server still starts, but analysis
/// requests are answered with an error.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (`BIND_ADDR`).
    pub bind_addr: SocketAddr,
    /// Upstream endpoint, key and timeouts.
    pub openai: OpenAiClientConfig,
    /// Model identifier sent with every completion (`OPENAI_MODEL`).
    pub model: String,
    /// Completion budget (`OPENAI_MAX_TOKENS`).
    pub max_tokens: u32,
    pub prompts: PromptTemplates,
    pub features: Features,
    pub storage: Option<StorageConfig>,
    /// CORS origins. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Request body cap; base64 photos are large.
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Features {
    /// `AI_ANALYSIS_ENABLED`; when false the analyze endpoint answers 503.
    pub ai_analysis_enabled: bool,
}

/// Storage backend credentials handed to clients through `/api/config`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub anon_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional, with defaults:
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`, `OPENAI_MAX_TOKENS`,
    ///   `OPENAI_TIMEOUT_SECS`, `OPENAI_MAX_ERROR_BODY_BYTES`
    /// - `IMAGE_PROMPT`, `TEXT_PROMPT`
    /// - `AI_ANALYSIS_ENABLED`
    /// - `SUPABASE_URL` + `SUPABASE_ANON_KEY`
    /// - `BIND_ADDR`, `CORS_ALLOWED_ORIGINS`, `MAX_BODY_BYTES`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated as unset.
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = OpenAiClientConfig::default();
        let openai = OpenAiClientConfig {
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: var("OPENAI_API_KEY"),
            default_timeout: parse_var::<u64, _>(&var, "OPENAI_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            max_error_body_bytes: parse_var(&var, "OPENAI_MAX_ERROR_BODY_BYTES")?
                .unwrap_or(defaults.max_error_body_bytes),
        };

        let prompt_defaults = PromptTemplates::default();
        let prompts = PromptTemplates {
            image: var("IMAGE_PROMPT").unwrap_or(prompt_defaults.image),
            text: var("TEXT_PROMPT").unwrap_or(prompt_defaults.text),
        };

        let ai_analysis_enabled = match var("AI_ANALYSIS_ENABLED") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                AppError::Config(format!("AI_ANALYSIS_ENABLED must be a boolean, got {v:?}"))
            })?,
            None => true,
        };

        let storage = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(StorageConfig { url, anon_key }),
            _ => None,
        };

        let allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty() && *o != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: parse_var(&var, "BIND_ADDR")?
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080))),
            openai,
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_var(&var, "OPENAI_MAX_TOKENS")?.unwrap_or(1000),
            prompts,
            features: Features { ai_analysis_enabled },
            storage,
            allowed_origins,
            max_body_bytes: parse_var(&var, "MAX_BODY_BYTES")?.unwrap_or(10 * 1024 * 1024),
        })
    }
}

fn parse_var<T, V>(var: &V, key: &str) -> Result<Option<T>, AppError>
where
    V: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AppError::Config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
