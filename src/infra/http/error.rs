use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::render::RenderError;
use crate::domain::error::DomainError;

/// Wire shape of every API error: a short message, plus diagnostic details
/// when they are safe to share.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, None)
    }

    pub fn render_failed(details: String) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate PDF",
            Some(details),
        )
    }
}

impl From<RenderError> for ApiError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Domain(DomainError::Validation { message }) => {
                ApiError::bad_request(message)
            }
            RenderError::Engine(err) => ApiError::render_failed(err.to_string()),
            RenderError::Fingerprint(err) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate PDF",
                Some(err.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let diagnostic = self
            .details
            .clone()
            .unwrap_or_else(|| self.message.clone());
        let body = ApiErrorBody {
            error: self.message,
            details: self.details,
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, diagnostic)
            .attach(&mut response);
        response
    }
}
