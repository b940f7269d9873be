//! Render and cache handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::application::render::RenderedPdf;
use crate::cache::CacheStats;
use crate::domain::document::RenderOptions;

use super::AppState;
use super::error::ApiError;

const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-render-cache");

#[derive(Debug, Deserialize)]
pub struct RenderNoteRequest {
    pub content: String,
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Deserialize)]
pub struct RenderHtmlRequest {
    pub html: String,
    pub title: String,
}

pub async fn render_note(
    State(state): State<AppState>,
    Json(request): Json<RenderNoteRequest>,
) -> Result<Response, ApiError> {
    let rendered = state
        .render
        .render_markdown(&request.content, &request.options)
        .await?;
    Ok(pdf_response(rendered))
}

pub async fn render_html(
    State(state): State<AppState>,
    Json(request): Json<RenderHtmlRequest>,
) -> Result<Response, ApiError> {
    let rendered = state
        .render
        .render_html(&request.html, &request.title)
        .await?;
    Ok(pdf_response(rendered))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.store.stats().await)
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn pdf_response(rendered: RenderedPdf) -> Response {
    let cache_status = if rendered.from_cache { "hit" } else { "miss" };
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"document.pdf\"",
            ),
            (CACHE_STATUS_HEADER, cache_status),
        ],
        rendered.bytes,
    )
        .into_response()
}
