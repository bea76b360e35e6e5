//! Error types for supaman.
//!
//! This module defines all error types used throughout the supaman crate,
//! providing detailed context for debugging and user-friendly error messages.

use thiserror::Error;

/// The main error type for supaman operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Backend Errors ===
    /// The backend could not be reached, or refused a read.
    #[error("cannot reach backend during {operation}: {message}")]
    Connectivity {
        /// What was being attempted (`fetch`, `subscribe`, ...).
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The backend rejected an insert.
    #[error("write rejected: {message}")]
    Write {
        /// Description of what went wrong.
        message: String,
    },

    /// A realtime frame could not be understood.
    #[error("realtime protocol error: {0}")]
    Protocol(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Client Lifecycle Errors ===
    /// The shared backend client was initialized twice.
    #[error("backend client is already initialized")]
    AlreadyInitialized,

    /// The shared backend client was used before initialization.
    #[error("backend client is not initialized")]
    NotInitialized,

    // === I/O Errors ===
    /// File system or terminal operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for supaman operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new connectivity error.
    #[must_use]
    pub fn connectivity(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Connectivity {
            operation,
            message: message.into(),
        }
    }

    /// Create a new write error.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Create a new protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the backend was unreachable.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// Check if this error is a rejected write.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_error_display() {
        let err = Error::connectivity("fetch", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("fetch"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_write_error_display() {
        let err = Error::write("title violates not-null constraint");
        assert_eq!(
            err.to_string(),
            "write rejected: title violates not-null constraint"
        );
    }

    #[test]
    fn test_predicates() {
        assert!(Error::connectivity("subscribe", "x").is_connectivity());
        assert!(!Error::connectivity("subscribe", "x").is_write());
        assert!(Error::write("x").is_write());
        assert!(!Error::NotInitialized.is_connectivity());
    }

    #[test]
    fn test_lifecycle_errors_display() {
        assert_eq!(
            Error::AlreadyInitialized.to_string(),
            "backend client is already initialized"
        );
        assert_eq!(
            Error::NotInitialized.to_string(),
            "backend client is not initialized"
        );
    }

    #[test]
    fn test_protocol_error() {
        let err = Error::protocol("missing topic");
        assert_eq!(err.to_string(), "realtime protocol error: missing topic");
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("backend.url is not set");
        assert!(err.to_string().contains("backend.url"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("stdout closed"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }
}
