//! Match telemetry: data model, sample store, transport and metrics aggregation.
//!
//! The generator that produces samples lives in the `match-sim` crate; this
//! crate owns everything that happens to a sample once it exists.

pub mod aggregator;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod memory_store;
pub mod models;
pub mod transport;

use std::sync::Arc;

use axum::{Extension, Router, http::Method, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    aggregator::MetricsAggregator,
    database::SampleStore,
    handlers::{get_latest_metrics, get_player_samples, get_run_metrics, health_check, list_runs},
};

/// Installs the fmt subscriber used by every binary, filtered by `RUST_LOG`.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Aggregator shared by the HTTP handlers.
pub type SharedAggregator = MetricsAggregator<Arc<dyn SampleStore>>;

pub fn create_router(store: Arc<dyn SampleStore>) -> Router {
    let aggregator: SharedAggregator = MetricsAggregator::new(store);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/runs", get(list_runs))
        .route("/runs/latest/metrics", get(get_latest_metrics))
        .route("/runs/{run_id}/metrics", get(get_run_metrics))
        .route(
            "/runs/{run_id}/players/{player_id}/samples",
            get(get_player_samples),
        )
        .layer(Extension(aggregator))
        .layer(cors)
}

pub async fn run_server(store: Arc<dyn SampleStore>, port: u16) -> anyhow::Result<()> {
    let app = create_router(store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
