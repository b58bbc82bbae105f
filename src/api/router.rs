use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected routes: bearer token required when API_TOKEN is set
    let protected = Router::new()
        // Registry
        .route("/api/chains", get(handlers::chains::list))
        // Holdings
        .route("/api/positions/:address", get(handlers::positions::get))
        .route("/api/positions/:address/risk", get(handlers::positions::risk))
        .route("/api/positions/:address/transfers", get(handlers::positions::transfers))
        // Opportunities
        .route("/api/opportunities", get(handlers::opportunities::list))
        .route("/api/opportunities/:id/history", get(handlers::opportunities::history))
        // Risk and recommendations
        .route("/api/risk/assess", post(handlers::risk::assess))
        .route("/api/optimize", post(handlers::optimize::optimize))
        // Rebalancing
        .route("/api/rebalance/plan", post(handlers::rebalance::plan))
        .route("/api/rebalance/estimate", post(handlers::rebalance::estimate))
        .route("/api/rebalance/execute", post(handlers::rebalance::execute))
        // Control
        .route("/api/control/stop", post(handlers::control::stop))
        .route("/api/control/resume", post(handlers::control::resume))
        .route("/api/control/status", get(handlers::control::status))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
