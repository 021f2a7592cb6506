mod handlers;
mod metrics;
mod routes;

use agrolab_common::config::GraderConfig;
use agrolab_engine::GradingEngine;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: GradingEngine,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("AGROLAB_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("AgroLab grader API booting...");

    let config = GraderConfig::load_default().context("Failed to load grader configuration")?;
    let engine = GradingEngine::from_config(&config)?;
    metrics::init();

    info!(
        backend = engine.backend(),
        exercises = engine.catalog().len(),
        max_concurrent = config.max_concurrent,
        time_budget_ms = config.time_budget_ms,
        "Grading engine ready"
    );

    let state = Arc::new(AppState { engine });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
