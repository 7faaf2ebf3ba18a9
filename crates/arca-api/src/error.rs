//! HTTP error mapping
//!
//! Wraps `AppError` so every handler returns the structured error body
//! `{error, summary, code, cause?}` with the status the error describes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use arca_core::{AppError, ErrorMetadata, LogLevel};

pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let err = self.0;
        match err.log_level() {
            LogLevel::Debug => tracing::debug!(error = %err, "Request failed"),
            LogLevel::Warn => tracing::warn!(error = %err, "Request failed"),
            LogLevel::Error => tracing::error!(error = %err.detailed_message(), "Request failed"),
        }

        let status =
            StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let cause = {
            use std::error::Error;
            err.source().map(|source| source.to_string())
        };

        let body = serde_json::json!({
            "error": err.error_type(),
            "summary": err.client_message(),
            "code": err.error_code(),
            "cause": cause,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_404() {
        let response = HttpAppError(AppError::NotFound("nope".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn maps_wrol_mode_to_403() {
        let response = HttpAppError(AppError::WrolMode("denied".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn maps_version_mismatch_to_409() {
        let err = AppError::ConfigVersionMismatch {
            name: "domains".to_string(),
            incoming: 1,
            current: 2,
        };
        let response = HttpAppError(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
