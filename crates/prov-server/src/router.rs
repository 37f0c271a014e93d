use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all provenance endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/sign", post(handler::sign_handler))
        .route("/v1/verify", post(handler::verify_handler))
        .route("/v1/pubkey", get(handler::pubkey_handler))
        .route("/v1/pubkey/publish", post(handler::publish_pubkey_handler))
        .route("/v1/hashes", post(handler::ingest_handler))
        .route("/v1/hashes/:digest/proof", get(handler::proof_handler))
        .route("/v1/root", get(handler::root_handler))
        .route("/v1/anchor", post(handler::anchor_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
