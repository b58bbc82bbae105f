use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{OptimizationCriteria, OptimizationReport};
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub address: String,
    #[serde(default)]
    pub criteria: OptimizationCriteria,
}

/// POST /api/optimize: Ranked recommendations for one holder.
pub async fn optimize(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<ApiResponse<OptimizationReport>>, AppError> {
    let report = state.context.engine.optimize(&req.address, &req.criteria).await?;
    Ok(ApiResponse::ok(report))
}
