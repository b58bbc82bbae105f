use axum::extract::{Path, Query, State};
use axum::Json;

use crate::errors::{validate_address, AppError};
use crate::intelligence::PortfolioRiskSummary;
use crate::models::{ExecutionReceipt, PortfolioSnapshot};
use crate::AppState;

use super::{ApiResponse, RefreshQuery};

/// GET /api/positions/:address: Cross-chain holdings of one address.
pub async fn get(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ApiResponse<PortfolioSnapshot>>, AppError> {
    let snapshot = state.context.scanner.scan(&address, query.refresh).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// GET /api/positions/:address/risk: Portfolio-level risk of current holdings.
pub async fn risk(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ApiResponse<PortfolioRiskSummary>>, AppError> {
    let ctx = &state.context;
    let (snapshot, catalog) = tokio::join!(
        ctx.scanner.scan(&address, query.refresh),
        ctx.catalog.opportunities(false)
    );
    let snapshot = snapshot?;
    Ok(ApiResponse::ok(ctx.risk.assess_portfolio(&snapshot.assets, &catalog)))
}

/// GET /api/positions/:address/transfers: Receipts of executed operations.
pub async fn transfers(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<Vec<ExecutionReceipt>>>, AppError> {
    validate_address(&address)?;
    let receipts = state.context.orchestrator.receipts().for_holder(&address).await;
    Ok(ApiResponse::ok(receipts))
}
