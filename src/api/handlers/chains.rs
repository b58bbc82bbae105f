use axum::extract::State;
use axum::Json;

use crate::chains::ChainInfo;
use crate::AppState;

use super::ApiResponse;

/// GET /api/chains: Networks the scanner reads.
pub async fn list(State(state): State<AppState>) -> Json<ApiResponse<Vec<ChainInfo>>> {
    ApiResponse::ok(state.context.registry.chains().to_vec())
}
