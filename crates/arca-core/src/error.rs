//! Error types module
//!
//! All errors surface through the `AppError` enum, which can represent
//! database, filesystem, validation, and download-domain failures. The
//! `ErrorMetadata` trait lets each error self-describe how it should be
//! presented over HTTP.

use std::io;

use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid download: {0}")]
    InvalidDownload(String),

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("Config version mismatch for {name}: incoming {incoming} is behind {current}")]
    ConfigVersionMismatch {
        name: String,
        incoming: i32,
        current: i32,
    },

    #[error("Refused while WROL mode is enabled: {0}")]
    WrolMode(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Validation(format!("URL parsing error: {}", err))
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Validation(_) => "Validation",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidDownload(_) => "InvalidDownload",
            AppError::ConfigFile(_) => "ConfigFile",
            AppError::ConfigVersionMismatch { .. } => "ConfigVersionMismatch",
            AppError::WrolMode(_) => "WrolMode",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::Database(_) => 500,
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::InvalidDownload(_) => 400,
            AppError::ConfigFile(_) => 500,
            AppError::ConfigVersionMismatch { .. } => 409,
            AppError::WrolMode(_) => 403,
            AppError::Internal(_) => 500,
            AppError::InternalWithSource { .. } => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidDownload(_) => "INVALID_DOWNLOAD",
            AppError::ConfigFile(_) => "CONFIG_FILE_ERROR",
            AppError::ConfigVersionMismatch { .. } => "CONFIG_VERSION_MISMATCH",
            AppError::WrolMode(_) => "WROL_MODE_ENABLED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::InvalidDownload(ref msg) => msg.clone(),
            AppError::ConfigFile(_) => "Failed to read or write a config file".to_string(),
            AppError::ConfigVersionMismatch { name, .. } => {
                format!("Config {} was modified by another process", name)
            }
            AppError::WrolMode(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::Database(_) => LogLevel::Error,
            AppError::Validation(_) => LogLevel::Debug,
            AppError::NotFound(_) => LogLevel::Debug,
            AppError::Conflict(_) => LogLevel::Debug,
            AppError::InvalidDownload(_) => LogLevel::Debug,
            AppError::ConfigFile(_) => LogLevel::Error,
            AppError::ConfigVersionMismatch { .. } => LogLevel::Warn,
            AppError::WrolMode(_) => LogLevel::Warn,
            AppError::Internal(_) => LogLevel::Error,
            AppError::InternalWithSource { .. } => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        let sqlx_err = sqlx::Error::PoolClosed;
        let err = AppError::from(sqlx_err);
        match err {
            AppError::Database(_) => {
                assert_eq!(err.http_status_code(), 500);
                assert_eq!(err.error_code(), "DATABASE_ERROR");
                assert_eq!(err.client_message(), "Failed to access database");
                assert_eq!(err.log_level(), LogLevel::Error);
            }
            _ => panic!("Expected Database variant"),
        }
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Collection not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.client_message(), "Collection not found");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_version_mismatch() {
        let err = AppError::ConfigVersionMismatch {
            name: "inventories".to_string(),
            incoming: 2,
            current: 5,
        };
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "CONFIG_VERSION_MISMATCH");
        assert!(err.client_message().contains("inventories"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_wrol_mode() {
        let err = AppError::WrolMode("Cannot modify configs".to_string());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "WROL_MODE_ENABLED");
    }

    #[test]
    fn test_detailed_message_includes_chain() {
        let source = anyhow::anyhow!("disk unplugged");
        let err = AppError::InternalWithSource {
            message: "move failed".to_string(),
            source,
        };
        let details = err.detailed_message();
        assert!(details.contains("Caused by: disk unplugged"));
    }
}
