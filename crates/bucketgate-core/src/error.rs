//! Error types module
//!
//! All failures of the upload engine are unified under the `AppError` enum. Each variant
//! self-describes how it is presented over HTTP through the `ErrorMetadata` trait.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

#[cfg(feature = "sqlx")]
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

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A write or read against the record store failed. For state-changing calls the
    /// true outcome of the operation is unknown to the caller.
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Envelope could not be opened. Carries no detail on purpose: wrong key and
    /// tampered ciphertext must be indistinguishable.
    #[error("Decryption failed")]
    Decryption,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Clock moved backwards: last id at {last_ms}ms, clock reads {now_ms}ms")]
    ClockSkew { last_ms: u64, now_ms: u64 },

    #[error("Storage backend error: {0}")]
    UpstreamStorage(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
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

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Outcome unknown; check the file status before retrying"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the access token"),
            true,
            LogLevel::Debug,
        ),
        AppError::Decryption => (
            400,
            "DECRYPTION_FAILED",
            false,
            Some("Re-seal the value with the current key"),
            true,
            LogLevel::Warn,
        ),
        AppError::Configuration(_) => (
            500,
            "CONFIGURATION_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::ClockSkew { .. } => (
            503,
            "CLOCK_SKEW",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::UpstreamStorage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry the upload step"),
            false,
            LogLevel::Error,
        ),
        AppError::InvalidState(_) => (
            409,
            "INVALID_STATE",
            false,
            Some("Start a new upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Decryption => "Decryption",
            AppError::Configuration(_) => "Configuration",
            AppError::ClockSkew { .. } => "ClockSkew",
            AppError::UpstreamStorage(_) => "UpstreamStorage",
            AppError::InvalidState(_) => "InvalidState",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
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
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => {
                "Failed to access database; the outcome of this operation is unknown".to_string()
            }
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(_) => "Authentication failed".to_string(),
            AppError::Decryption => "Failed to decrypt value".to_string(),
            AppError::Configuration(_) => "Server misconfiguration".to_string(),
            AppError::ClockSkew { .. } => "Identifier generation unavailable".to_string(),
            AppError::UpstreamStorage(ref msg) => format!("Storage backend error: {}", msg),
            AppError::InvalidState(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("outcome"));
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_invalid_state() {
        let err = AppError::InvalidState("file 7 is already completed".to_string());
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "file 7 is already completed");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_decryption_message_is_uniform() {
        let err = AppError::Decryption;
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.client_message(), "Failed to decrypt value");
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_unauthorized_hides_reason() {
        let err = AppError::Unauthorized("token expired".to_string());
        assert_eq!(err.http_status_code(), 401);
        assert_eq!(err.client_message(), "Authentication failed");
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_upstream_storage_is_bad_gateway() {
        let err = AppError::UpstreamStorage("NoSuchUpload".to_string());
        assert_eq!(err.http_status_code(), 502);
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("NoSuchUpload"));
    }

    #[test]
    fn test_clock_skew_is_recoverable() {
        let err = AppError::ClockSkew {
            last_ms: 10,
            now_ms: 5,
        };
        assert_eq!(err.http_status_code(), 503);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("10ms"));
    }
}
