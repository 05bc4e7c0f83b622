//! HTTP error surface (spec §7, SPEC_FULL.md §11). Grounded on
//! `ferrex-server/src/infra/errors.rs`'s `AppError` / `IntoResponse`
//! pattern, adapted to wrap [`ErrorCategory`] instead of a bare status
//! code so the localized message travels with the category.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kotoba_core::ErrorCategory;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// A client-facing error: a category (which fixes the status code and the
/// localized message) plus an optional internal detail that is logged but
/// never serialized into the response body.
#[derive(Debug)]
pub struct AppError {
    category: ErrorCategory,
    internal_detail: Option<String>,
}

impl AppError {
    pub fn new(category: ErrorCategory) -> Self {
        Self {
            category,
            internal_detail: None,
        }
    }

    /// Attaches a log-only detail string; never reaches the client (spec
    /// §7 "never contain file paths, stack traces, or internal
    /// identifiers").
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.internal_detail = Some(detail.into());
        self
    }

    pub fn validation() -> Self {
        Self::new(ErrorCategory::Validation)
    }

    pub fn not_found() -> Self {
        Self::new(ErrorCategory::NotFound)
    }

    pub fn auth() -> Self {
        Self::new(ErrorCategory::Auth)
    }

    pub fn busy() -> Self {
        Self::new(ErrorCategory::Busy)
    }

    pub fn unsupported() -> Self {
        Self::new(ErrorCategory::Unsupported)
    }

    pub fn internal() -> Self {
        Self::new(ErrorCategory::Internal)
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.category.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(detail) = &self.internal_detail {
            tracing::error!(category = ?self.category, detail, "request failed");
        }

        let status = StatusCode::from_u16(self.category.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({ "detail": self.category.message() }));
        (status, body).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal().with_detail(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal().with_detail(err.to_string())
    }
}

impl From<kotoba_core::ProcessedSetError> for AppError {
    fn from(err: kotoba_core::ProcessedSetError) -> Self {
        Self::internal().with_detail(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal().with_detail(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_error_maps_to_409() {
        let response = AppError::busy().into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_error_maps_to_401() {
        let response = AppError::auth().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn cancelled_error_does_not_reuse_200() {
        let response = AppError::new(ErrorCategory::Cancelled).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
