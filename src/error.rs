// src/error.rs

//! Error types for the txmirror agent
//!
//! Every fallible operation in the crate returns [`Result`]. The error kinds
//! form a small closed set so callers can tell a local package-manager
//! failure apart from a remote ledger failure without matching on strings.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the txmirror agent
#[derive(Debug, Error)]
pub enum Error {
    /// The local package manager binary is missing or its invocation failed
    #[error("local history source error: {0}")]
    LocalSource(String),

    /// A history report or date field could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The ledger server returned a non-success response or was unreachable
    #[error("remote ledger error: {0}")]
    Remote(String),

    /// Input rejected before any external invocation (e.g. malformed id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration file missing a required value or unreadable
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem error (machine-id, os-release)
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// Build a [`Error::Remote`] from an HTTP status and response body.
    ///
    /// All four ledger calls report non-success responses the same way.
    pub fn remote_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            Error::Remote(format!("server returned status {status}"))
        } else {
            Error::Remote(format!("server returned status {status}: {body}"))
        }
    }
}
