//! Centralized error types for mailharvest.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailharvest library.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid or incomplete task configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The naming template failed to parse or expand.
    #[error("Naming template error: {0}")]
    Template(String),

    /// A mailbox session operation failed (connect, login, select,
    /// search, fetch, flag update).
    #[error("Mailbox error: {0}")]
    Mailbox(String),

    /// A remote store operation failed (directory create, existence
    /// probe, upload).
    #[error("Store error: {0}")]
    Store(String),
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<imap::Error> for HarvestError {
    fn from(source: imap::Error) -> Self {
        Self::Mailbox(source.to_string())
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(source: reqwest::Error) -> Self {
        Self::Store(source.to_string())
    }
}
