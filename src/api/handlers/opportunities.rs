use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{ApySample, YieldOpportunity};
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct OpportunityQuery {
    pub chain: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/opportunities: Active catalog, optionally for one chain.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OpportunityQuery>,
) -> Result<Json<ApiResponse<Vec<YieldOpportunity>>>, AppError> {
    let catalog = &state.context.catalog;
    let opportunities = match query.chain.as_deref().map(str::trim) {
        Some(chain) if !chain.is_empty() => {
            if !state.context.registry.contains(chain) {
                return Err(AppError::NotFound(format!("unknown chain {chain}")));
            }
            catalog.opportunities_by_chain(chain, query.refresh).await
        }
        _ => catalog.opportunities(query.refresh).await,
    };
    Ok(ApiResponse::ok(opportunities))
}

/// GET /api/opportunities/:id/history: APY samples, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ApySample>>>, AppError> {
    let history = state
        .context
        .catalog
        .apy_history(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("opportunity {id}")))?;
    Ok(ApiResponse::ok(history))
}
