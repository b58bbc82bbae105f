use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// POST /api/control/stop: Pause plan execution.
pub async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    state.pause_flag.store(true, Ordering::Relaxed);
    tracing::warn!("Plan execution PAUSED via control API");
    (StatusCode::OK, Json(json!({ "status": "paused" })))
}

/// POST /api/control/resume: Resume plan execution.
pub async fn resume(State(state): State<AppState>) -> impl IntoResponse {
    state.pause_flag.store(false, Ordering::Relaxed);
    tracing::info!("Plan execution RESUMED via control API");
    (StatusCode::OK, Json(json!({ "status": "running" })))
}

/// GET /api/control/status: Current system status.
///
/// `mode` is what execution actually does; only dry-run signing exists, so
/// `DRY_RUN=false` is reported under `dry_run` without changing the mode.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let paused = state.pause_flag.load(Ordering::Relaxed);
    let signer = state.signer.as_ref().map(|s| s.address());
    let receipts = state.context.orchestrator.receipts().len().await;

    Json(json!({
        "mode": "dry_run",
        "dry_run": state.config.dry_run,
        "paused": paused,
        "signer": signer,
        "receipts": receipts,
        "catalog_records": state.context.catalog.len().await,
    }))
}
