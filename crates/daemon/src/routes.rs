//! `POST /api/search` (on-demand trigger) and `GET /healthz` / `GET /metrics`.
//!
//! Adapted from the teacher's `routes::{search,health}` handler/router
//! wiring; every other teacher route (movies, queue, quality, streaming,
//! calendar) has no counterpart here and is dropped.

use crate::error::ApiResult;
use crate::metrics::DaemonMetrics;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<DaemonMetrics>,
    pub search_trigger: mpsc::Sender<()>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/search", post(trigger_search))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<crate::metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[instrument(skip(state))]
async fn trigger_search(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    info!("on-demand search triggered via API");

    if state.search_trigger.try_send(()).is_err() {
        return Ok(Json(json!({ "status": "already_running" })));
    }

    Ok(Json(json!({ "status": "triggered" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_healthy() {
        let Json(body) = healthz().await;
        assert_eq!(body["status"], "healthy");
    }
}
