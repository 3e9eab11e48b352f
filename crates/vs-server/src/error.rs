//! Error-to-HTTP response conversion.
//!
//! Clients only ever see a status code: every error response has an empty
//! body. The detail goes to the log instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: vs_core::Error,
}

impl AppError {
    pub fn new(inner: vs_core::Error) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<vs_core::Error> for AppError {
    fn from(e: vs_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, kind = self.inner.kind(), error = %self.inner, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request rejected");
        }

        status.into_response()
    }
}
