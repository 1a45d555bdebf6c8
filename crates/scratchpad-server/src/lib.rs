//! HTTP surface of the shared scratchpad lock service.
//!
//! The heartbeat endpoint stands in for the page's periodic poll; the lock and
//! save logic itself lives in `scratchpad-core`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod nonce;
pub mod state;
pub mod storage;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::{
    get_resource_handler, health_handler, heartbeat_handler, nonce_handler, save_handler,
};
use state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/heartbeat", post(heartbeat_handler))
        .route("/api/resources/{key}", get(get_resource_handler))
        .route("/api/resources/{key}/nonce", get(nonce_handler))
        .route("/api/resources/{key}/save", post(save_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
