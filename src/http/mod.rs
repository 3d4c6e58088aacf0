//! Axum CRUD + WebSocket surface. Grounded in the teacher's
//! `web/server.rs` (an `axum::Router` merging several route groups) but
//! rebuilt around the LPR/camera/traffic domain this crate serves,
//! following `original_source/router/lpr.py` / `router/camera.py` /
//! `router/traffic.py` for the route shapes.

mod camera;
mod error;
mod lpr;
mod traffic;
mod ws;

use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(lpr::router())
        .merge(camera::router())
        .merge(traffic::router())
        .merge(ws::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
