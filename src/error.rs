//! Error types for the audit vault.
//!
//! This module provides a unified error type [`VaultError`] for all archive,
//! legal hold and reconciliation operations, along with a convenient
//! [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Lookup**: a referenced archive, key artifact or hold does not exist
//! - **Conflict**: a hold already owns an archive, or an archive id collides
//! - **Integrity**: a stored ciphertext no longer matches its catalog digest
//! - **Policy**: a retention floor or purge approval rule was violated
//! - **Storage**: catalog, filesystem and serialization failures
//!
//! # Example
//!
//! ```rust
//! use auditvault::error::{Result, VaultError};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     if id.is_empty() {
//!         return Err(VaultError::InvalidArgument("archive id cannot be empty".into()));
//!     }
//!     Err(VaultError::NotFound(format!("archive {}", id)))
//! }
//!
//! let err = lookup("sec-1").unwrap_err();
//! assert!(!err.is_retryable());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Archive `archive_id` failed digest verification. Digest values are
    /// deliberately absent from this error.
    #[error("Integrity violation on archive {archive_id}")]
    IntegrityViolation { archive_id: String },

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Check if error is transient and worth retrying.
    ///
    /// Only the reconciliation loop acts on this; caller-facing operations
    /// surface every error immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            VaultError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::StorageFull
                    | io::ErrorKind::ResourceBusy
            ),
            VaultError::Catalog(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Whether this error is an integrity violation that must be alerted on.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, VaultError::IntegrityViolation { .. })
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Internal(format!("blocking task failed: {}", e))
    }
}

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
