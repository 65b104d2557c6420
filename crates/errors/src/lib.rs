#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for batchwrite
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone; filesystem causes are shared behind `Arc`.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod write;

// Re-export all error types at the root
pub use config::ConfigError;
pub use write::{Phase, WriteError};

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The write error behind this error, if any
    #[must_use]
    pub fn as_write(&self) -> Option<&WriteError> {
        match self {
            Self::Write(err) => Some(err),
            _ => None,
        }
    }

    /// Kind of the root-cause filesystem error
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        self.as_write().map(WriteError::kind)
    }
}

/// Result type alias for batchwrite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Write(err) => err.user_message(),
            Error::Config(err) => err.user_message(),
            Error::Internal(_) => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Write(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Internal(_) => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Write(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
        }
    }
}
