//! Error types for commitgate.
//!
//! These are infrastructure errors only. Policy violations are ordinary data
//! ([`crate::checks::Violation`]) and never travel through this type.

use thiserror::Error;

/// Infrastructure failure that aborts the current invocation.
#[derive(Error, Debug)]
pub enum Error {
    /// A revision, commit, or object identifier did not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A ref-update record could not be parsed.
    #[error("malformed ref update on line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    /// The index holds conflict stages for this path.
    #[error("unmerged path: {0}")]
    Unmerged(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => Error::NotFound(err.message().to_string()),
            _ => Error::Git(err.message().to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
