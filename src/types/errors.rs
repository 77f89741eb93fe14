//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Every
//! failure in the system is an [`AppError`]: a kind tag, a human-readable
//! message, and an operational flag that the error policy reads to decide
//! whether the process may keep running.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Fixed taxonomy of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Cannot establish, or is missing, a live connection.
    ConnectionFailed,
    /// Caller-supplied argument failed validation.
    InvalidInput,
    /// Named resource is absent.
    ResourceNotFound,
    /// An otherwise-valid request failed against a live connection.
    OperationFailed,
    /// Non-connection startup failure.
    InitializationFailed,
}

impl ErrorKind {
    /// Kind tag as it appears in log records and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed => "CONNECTION_FAILED",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorKind::OperationFailed => "OPERATION_FAILED",
            ErrorKind::InitializationFailed => "INITIALIZATION_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified application error.
///
/// Immutable once constructed. `operational` marks anticipated failure
/// modes (bad input, exhausted retries, missing resources); everything
/// else, including wrapped foreign errors, is treated as a programmer
/// error by the crash policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    operational: bool,
}

impl AppError {
    /// Construct an operational error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operational: true,
        }
    }

    /// Construct a non-operational (programmer) error of the given kind.
    pub fn untrusted(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operational: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is an anticipated failure the process can survive.
    pub fn is_operational(&self) -> bool {
        self.operational
    }
}

// Convenience constructors
impl AppError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    pub fn resource_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, msg)
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationFailed, msg)
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InitializationFailed, msg)
    }
}

// Foreign errors carry no classification of their own, so they come in as
// non-operational: the policy must treat anything that is not a deliberate
// AppError as a crash signal.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::untrusted(ErrorKind::OperationFailed, format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::untrusted(
            ErrorKind::OperationFailed,
            format!("serialization error: {err}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_embeds_kind_and_message() {
        let err = AppError::connection_failed("kv store unreachable");
        assert_eq!(err.to_string(), "CONNECTION_FAILED: kv store unreachable");
    }

    #[test]
    fn convenience_constructors_are_operational() {
        assert!(AppError::connection_failed("x").is_operational());
        assert!(AppError::invalid_input("x").is_operational());
        assert!(AppError::resource_not_found("x").is_operational());
        assert!(AppError::operation_failed("x").is_operational());
        assert!(AppError::initialization_failed("x").is_operational());
    }

    #[test]
    fn untrusted_constructor_clears_operational_flag() {
        let err = AppError::untrusted(ErrorKind::InvalidInput, "bug");
        assert!(!err.is_operational());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn io_errors_wrap_as_non_operational() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = AppError::from(io);
        assert!(!err.is_operational());
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }

    #[test]
    fn kind_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::ResourceNotFound).unwrap();
        assert_eq!(json, "\"RESOURCE_NOT_FOUND\"");
    }
}
