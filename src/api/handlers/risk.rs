use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::{AppError, ValidationError};
use crate::intelligence::RiskAssessment;
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub opportunity_id: String,
    pub amount: Decimal,
}

/// POST /api/risk/assess: Risk of investing `amount` into one opportunity.
pub async fn assess(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> Result<Json<ApiResponse<RiskAssessment>>, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount", "must be positive").into());
    }

    // Make sure the catalog has been loaded at least once.
    state.context.catalog.opportunities(false).await;
    let opportunity = state
        .context
        .catalog
        .get(&req.opportunity_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("opportunity {}", req.opportunity_id)))?;

    Ok(ApiResponse::ok(state.context.risk.assess(&opportunity, req.amount)))
}
