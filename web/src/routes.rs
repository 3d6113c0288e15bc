//! Router configuration.

use crate::handlers::health::{health_check, metrics, readiness_check};
use crate::handlers::queue::{
    can_purchase, complete_purchase, get_position, get_stats, join_queue, leave_queue,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// Queue routes live under `/queue`; health, readiness and metrics sit at
/// the root and are unauthenticated.
pub fn build_router(state: AppState) -> Router {
    let queue_routes = Router::new()
        .route("/join", post(join_queue))
        .route("/position/:user_address", get(get_position))
        .route("/can-purchase/:user_address", get(can_purchase))
        .route("/complete/:user_address", post(complete_purchase))
        .route("/leave", post(leave_queue))
        .route("/stats", get(get_stats));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/queue", queue_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
