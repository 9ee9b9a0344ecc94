//! HTTP surface: one health-check route plus the WebSocket upgrade path.

pub mod ws;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Build the relay router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "SyncSpace relay" }))
        .route("/ws/{doc}", get(ws::handle_ws))
        .with_state(state)
}
