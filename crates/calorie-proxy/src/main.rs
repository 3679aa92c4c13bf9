mod analysis;
mod config;
mod error;
mod server;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use calorie_common::openai::OpenAiClient;

use analysis::Analyzer;
use config::Config;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting calorie-proxy");

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        base_url = %config.openai.base_url,
        model = %config.model,
        timeout_ms = config.openai.default_timeout.as_millis(),
        ai_analysis_enabled = config.features.ai_analysis_enabled,
        storage = config.storage.is_some(),
        "configuration loaded"
    );

    let openai = Arc::new(OpenAiClient::new(config.openai.clone())?);
    if !openai.has_api_key() {
        warn!("OPENAI_API_KEY not set, analysis requests will fail");
    }

    let analyzer = Analyzer::new(
        openai,
        config.prompts.clone(),
        config.model.clone(),
        config.max_tokens,
    );
    let app = server::router(AppState::new(analyzer, &config), &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
        })?;

    info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
