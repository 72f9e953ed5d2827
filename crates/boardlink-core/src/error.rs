//! Unified error handling for Boardlink.
//!
//! This module provides a common error type used across all crates,
//! reducing boilerplate and making error handling consistent.

/// Unified error type for Boardlink.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed input, rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Device credential rejection. Deliberately carries no detail that
    /// would distinguish an unknown device from a wrong secret.
    #[error("Authentication rejected")]
    Auth,

    /// Operator session rejection.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (e.g. duplicate device registration).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Primary store failure. The triggering operation rolls back whole.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Secondary store mirror failure. Logged, never surfaced to callers.
    #[error("Replication error: {0}")]
    Replication(String),

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

// Error conversion helpers
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Convenience constructors for common errors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn replication(msg: impl Into<String>) -> Self {
        Self::Replication(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convenience macros for creating errors.
#[macro_export]
macro_rules! validation_err {
    ($msg:expr) => {
        $crate::error::Error::Validation($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Validation(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! storage_err {
    ($msg:expr) => {
        $crate::error::Error::Storage($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Storage(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! not_found_err {
    ($msg:expr) => {
        $crate::error::Error::NotFound($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::NotFound(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_is_opaque() {
        // The device-credential rejection must not leak which check failed.
        let e = Error::Auth;
        assert_eq!(e.to_string(), "Authentication rejected");
    }

    #[test]
    fn test_constructors() {
        assert!(matches!(Error::not_found("x"), Error::NotFound(_)));
        assert!(matches!(Error::conflict("x"), Error::Conflict(_)));
        assert!(matches!(
            not_found_err!("device {}", "esp32_1"),
            Error::NotFound(_)
        ));
    }
}
