//! Read-only HTTP API over stored runs.

use std::collections::BTreeMap;

use axum::{Extension, extract::Path, http::StatusCode, response::Json};
use serde::Serialize;

use crate::{
    SharedAggregator,
    errors::AppError,
    models::{AggregateMetrics, PlayerId, RunId, SQUAD_SIZE, TelemetrySample, is_valid_player},
};

#[derive(Debug, Serialize)]
pub struct RunMetricsResponse {
    pub run_id: RunId,
    pub players: BTreeMap<PlayerId, AggregateMetrics>,
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// All known runs, oldest first.
pub async fn list_runs(
    Extension(aggregator): Extension<SharedAggregator>,
) -> Result<Json<Vec<RunId>>, AppError> {
    let runs = aggregator.store().list_runs().await?;
    Ok(Json(runs.into_iter().collect()))
}

pub async fn get_latest_metrics(
    Extension(aggregator): Extension<SharedAggregator>,
) -> Result<Json<RunMetricsResponse>, AppError> {
    let (run_id, players) = aggregator
        .aggregate_latest()
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(RunMetricsResponse { run_id, players }))
}

pub async fn get_run_metrics(
    Extension(aggregator): Extension<SharedAggregator>,
    Path(run_id): Path<String>,
) -> Result<Json<RunMetricsResponse>, AppError> {
    let run_id = RunId::new(run_id);
    if !aggregator.store().list_runs().await?.contains(&run_id) {
        return Err(AppError::NotFound);
    }
    let players = aggregator.aggregate(&run_id).await?;
    Ok(Json(RunMetricsResponse { run_id, players }))
}

pub async fn get_player_samples(
    Extension(aggregator): Extension<SharedAggregator>,
    Path((run_id, player_id)): Path<(String, PlayerId)>,
) -> Result<Json<Vec<TelemetrySample>>, AppError> {
    if !is_valid_player(player_id) {
        return Err(AppError::InvalidInput(format!(
            "player_id must be between 1 and {SQUAD_SIZE}"
        )));
    }
    let samples = aggregator
        .store()
        .query(&RunId::new(run_id), player_id)
        .await?;
    Ok(Json(samples))
}
