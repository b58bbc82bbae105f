use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::errors::{validate_address, AppError};
use crate::execution::{CostEstimate, DryRunSigner, TransactionSigner};
use crate::models::{OptimizationCriteria, PortfolioRebalanceReport, RebalancingAction, RebalancingResult};
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub address: String,
    #[serde(default)]
    pub criteria: OptimizationCriteria,
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub actions: Vec<RebalancingAction>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub address: String,
    pub actions: Vec<RebalancingAction>,
}

/// POST /api/rebalance/plan: Scan, optimize and diff into a plan.
pub async fn plan(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<ApiResponse<PortfolioRebalanceReport>>, AppError> {
    let report = state.context.plan_rebalance(&req.address, &req.criteria).await?;
    Ok(ApiResponse::ok(report))
}

/// POST /api/rebalance/estimate: Pre-flight fee estimate for a plan.
pub async fn estimate(
    State(state): State<AppState>,
    Json(req): Json<EstimateRequest>,
) -> Json<ApiResponse<CostEstimate>> {
    ApiResponse::ok(state.context.orchestrator.estimate(&req.actions))
}

/// POST /api/rebalance/execute: Run a plan action by action.
///
/// Rejected while execution is paused via the control API.
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ApiResponse<RebalancingResult>>, AppError> {
    if state.pause_flag.load(Ordering::Relaxed) {
        return Err(AppError::Conflict("execution is paused".into()));
    }
    validate_address(&req.address)?;

    let signer: Arc<dyn TransactionSigner> = match &state.signer {
        Some(signer) if signer.address().eq_ignore_ascii_case(&req.address) => signer.clone(),
        Some(signer) => {
            return Err(AppError::BadRequest(format!(
                "signer {} cannot act for {}",
                signer.address(),
                req.address
            )))
        }
        None => Arc::new(DryRunSigner::new(req.address.clone())),
    };

    // Dropping the request future (client gone) cancels the remaining actions.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = state
        .context
        .orchestrator
        .execute(&req.actions, signer.as_ref(), None, &cancel)
        .await;
    Ok(ApiResponse::ok(result))
}
