use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use calorie_common::nutrition::NutritionRecord;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::analysis::{AnalyzeRequest, Analyzer};
use crate::config::{Config, Features, StorageConfig};
use crate::error::AppError;

pub const SERVICE_NAME: &str = "CalorieAI API";

/// Shared, read-only state behind every handler.
#[derive(Clone)]
pub struct AppState {
    analyzer: Analyzer,
    features: Features,
    storage: Option<Arc<StorageConfig>>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, config: &Config) -> Self {
        Self {
            analyzer,
            features: config.features,
            storage: config.storage.clone().map(Arc::new),
        }
    }
}

pub fn router(state: AppState, config: &Config) -> Result<Router, AppError> {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let uri = request.uri().to_string();
        info_span!("http_request", method = ?request.method(), uri)
    });

    Ok(Router::new()
        .route(
            "/api/analyze-photo",
            post(analyze_photo).fallback(method_not_allowed),
        )
        .route("/api/health", get(health))
        .route("/api/config", get(client_config))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(trace_layer)
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| AppError::Config(format!("invalid CORS origin {o:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::OPTIONS, Method::GET])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(86_400)))
}

/// The feature toggle is checked before the body is looked at.
async fn analyze_photo(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<NutritionRecord>, AppError> {
    if !state.features.ai_analysis_enabled {
        return Err(AppError::AnalysisDisabled);
    }
    let Json(body) = body?;
    let input = body.into_input()?;
    let record = state.analyzer.analyze(input).await?;
    Ok(Json(record))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
    }))
}

#[derive(Debug, Serialize)]
struct ClientConfigResponse {
    supabase_url: String,
    supabase_anon_key: String,
    features: ClientFeatures,
}

#[derive(Debug, Serialize)]
struct ClientFeatures {
    supabase_enabled: bool,
    ai_analysis_enabled: bool,
}

async fn client_config(State(state): State<AppState>) -> Result<Json<ClientConfigResponse>, AppError> {
    let storage = state.storage.as_ref().ok_or(AppError::ClientConfigUnavailable)?;
    Ok(Json(ClientConfigResponse {
        supabase_url: storage.url.clone(),
        supabase_anon_key: storage.anon_key.clone(),
        features: ClientFeatures {
            supabase_enabled: true,
            ai_analysis_enabled: state.features.ai_analysis_enabled,
        },
    }))
}
