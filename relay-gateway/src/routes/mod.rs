//! HTTP routes and router assembly
//!
//! Two routes make up the core surface: the health check and the
//! WebSocket stream endpoint. Static dashboard serving is deliberately
//! not part of this router.

pub mod health;

use crate::state::AppState;
use crate::ws::ws_handler;
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Build the gateway router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/stream", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// CORS from the configured allow-list; an empty list is dev mode and
/// allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(parsed)
}
