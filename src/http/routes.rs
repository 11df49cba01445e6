use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Call lifecycle
        .route("/calls", post(handlers::start_call))
        .route("/calls/:call_id/mute", post(handlers::mute_call))
        .route("/calls/:call_id/retry", post(handlers::retry_call))
        .route("/calls/:call_id/hangup", post(handlers::hangup_call))
        // Call queries
        .route("/calls/:call_id/status", get(handlers::get_call_status))
        .route("/calls/:call_id/transcript", get(handlers::get_call_transcript))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
