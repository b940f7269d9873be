pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::render::RenderService;
use crate::cache::PdfStore;

#[derive(Clone)]
pub struct AppState {
    pub render: Arc<RenderService>,
    pub store: Arc<PdfStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/render", post(handlers::render_note))
        .route("/api/render-html", post(handlers::render_html))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/healthz", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
