// ABOUTME: Unified error taxonomy with closed error codes and transport status mapping
// ABOUTME: Provides AppError, ErrorCode, ErrorResponse and error classification helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! # Unified Error Handling System
//!
//! Every failure that reaches a service boundary carries one [`ErrorCode`]
//! from a small closed set. Call sites do not define their own error types;
//! they construct an [`AppError`] with a code and a human-readable message and
//! optionally wrap it with short operation labels on the way up.
//!
//! The transport layer turns the code into a status with
//! [`ErrorCode::http_status`] and renders [`ErrorResponse`] as the body.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned to clients for every internal error
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error.";

/// Closed set of error kinds used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A uniqueness rule was violated (duplicate linkage, duplicate email)
    Conflict,
    /// The request carried missing or malformed data
    Invalid,
    /// The requested record does not exist
    NotFound,
    /// The operation exists in the contract but has no implementation
    NotImplemented,
    /// The caller is not allowed to perform the operation
    Unauthorized,
    /// Anything unclassified
    Internal,
}

impl ErrorCode {
    /// Every defined error code
    pub const ALL: [Self; 6] = [
        Self::Conflict,
        Self::Invalid,
        Self::NotFound,
        Self::NotImplemented,
        Self::Unauthorized,
        Self::Internal,
    ];

    /// Wire representation of the code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
            Self::NotImplemented => "not_implemented",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }

    /// Parse a wire representation, returning `None` for unknown codes
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code)
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Invalid => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
            Self::NotImplemented => 501,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status for a wire error code; unknown codes map to 500
#[must_use]
pub fn status_for_code(code: &str) -> u16 {
    ErrorCode::from_code(code).map_or(500, ErrorCode::http_status)
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Operation labels, outermost first
    labels: Vec<String>,
    /// Source error for error chaining
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            labels: Vec::new(),
            source: None,
        }
    }

    /// Prefix the error with an operation label.
    ///
    /// The code and the user-facing message are left untouched; only the
    /// `Display` output gains a `label: ` prefix.
    #[must_use]
    pub fn wrap(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(0, label.into());
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Operation labels attached with [`AppError::wrap`], outermost first
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Message safe to show to a client
    #[must_use]
    pub fn user_message(&self) -> &str {
        if self.code == ErrorCode::Internal {
            INTERNAL_ERROR_MESSAGE
        } else {
            &self.message
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{label}: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Duplicate record or linkage
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    /// Resource not found, e.g. `not_found("User")` gives "User not found."
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{} not found.", resource.into()),
        )
    }

    /// Operation not implemented
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{} is not implemented.", operation.into()),
        )
    }

    /// Caller is not allowed to perform the operation
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

/// Find the first `AppError` in an error's source chain
fn find_app_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a AppError> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(app_error) = err.downcast_ref::<AppError>() {
            return Some(app_error);
        }
        current = err.source();
    }
    None
}

/// Classify any error. Errors not built as `AppError` are internal.
#[must_use]
pub fn error_code(error: &(dyn StdError + 'static)) -> ErrorCode {
    find_app_error(error).map_or(ErrorCode::Internal, |app_error| app_error.code)
}

/// Client-facing message for any error
#[must_use]
pub fn error_message(error: &(dyn StdError + 'static)) -> String {
    find_app_error(error).map_or_else(
        || INTERNAL_ERROR_MESSAGE.to_owned(),
        |app_error| app_error.user_message().to_owned(),
    )
}

/// HTTP error response body, `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Client-facing message
    pub error: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: error.user_message().to_owned(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self::from(&error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        let (code, message) = match &error {
            sqlx::Error::RowNotFound => (ErrorCode::NotFound, "Record not found."),
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                (ErrorCode::Conflict, "Record already exists.")
            }
            sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation() => {
                (ErrorCode::Invalid, "Referenced record does not exist.")
            }
            sqlx::Error::PoolClosed => (ErrorCode::Internal, "Database is closed."),
            _ => (ErrorCode::Internal, "Database operation failed."),
        };
        Self::new(code, message).with_source(error)
    }
}
