//! Remote store error types.

use std::fmt;

use thiserror::Error;

use crate::state::Source;

/// Status codes reported by the backing store's push and fetch APIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    Cancelled,
    InvalidArgument,
    NotFound,
    Internal,
    Unknown(String),
}

impl ErrorCode {
    /// Parse a wire code such as `permission-denied`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "permission-denied" => ErrorCode::PermissionDenied,
            "unauthenticated" => ErrorCode::Unauthenticated,
            "unavailable" => ErrorCode::Unavailable,
            "deadline-exceeded" => ErrorCode::DeadlineExceeded,
            "resource-exhausted" => ErrorCode::ResourceExhausted,
            "cancelled" => ErrorCode::Cancelled,
            "invalid-argument" => ErrorCode::InvalidArgument,
            "not-found" => ErrorCode::NotFound,
            "internal" => ErrorCode::Internal,
            other => ErrorCode::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::DeadlineExceeded => "deadline-exceeded",
            ErrorCode::ResourceExhausted => "resource-exhausted",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::NotFound => "not-found",
            ErrorCode::Internal => "internal",
            ErrorCode::Unknown(code) => code,
        }
    }

    /// Benign codes are expected for restricted sessions and never escalate.
    pub fn is_benign(&self) -> bool {
        matches!(self, ErrorCode::PermissionDenied)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct StoreError {
    pub code: ErrorCode,
    pub message: String,
}

impl StoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn is_benign(&self) -> bool {
        self.code.is_benign()
    }
}

/// A subscription the store refused to open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to subscribe to {stream}: {error}")]
pub struct SetupError {
    pub stream: Source,
    pub error: StoreError,
}
