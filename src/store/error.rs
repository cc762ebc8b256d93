//! Credential store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by every [`CredentialStore`](super::CredentialStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pool file does not exist yet.
    #[error("credential file does not exist: {}. Create users first", .path.display())]
    NotFound { path: PathBuf },

    /// The pool file holds nothing but the header row.
    #[error("credential file {} is empty or contains only headers", .path.display())]
    PoolEmpty { path: PathBuf },

    /// Every record in the pool has already been allocated.
    #[error("all {total} users in {} have been used", .path.display())]
    Exhausted { path: PathBuf, total: usize },

    /// A data line could not be parsed.
    #[error("malformed record on line {line}: {content}")]
    Malformed { line: usize, content: String },

    /// Another process held the store lock for longer than the configured wait.
    #[error("could not acquire lock on {} after {waited_ms}ms", .path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    /// A credential field cannot be represented in the line-oriented format.
    #[error("field '{field}' must not contain line breaks")]
    InvalidField { field: &'static str },

    /// Filesystem failure while reading, writing or creating directories.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Errors a caller is expected to handle by generating a fresh credential.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::PoolEmpty { .. } | StoreError::Exhausted { .. }
        )
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::PoolEmpty { .. } => "pool_empty",
            StoreError::Exhausted { .. } => "exhausted",
            StoreError::Malformed { .. } => "malformed",
            StoreError::LockTimeout { .. } => "lock_timeout",
            StoreError::InvalidField { .. } => "invalid_field",
            StoreError::Io(_) => "io",
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
