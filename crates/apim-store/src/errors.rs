//! Error helpers for apim-store
//!
//! Wraps apim-core RepoError with store-specific constructors

use apim_core::errors::{RepoError, RepoErrorKind};

/// Result type alias using RepoError
pub type Result<T> = std::result::Result<T, RepoError>;

/// Wrap a database client failure as a technical error
pub fn technical(op: &str, message: impl Into<String>, cause: rusqlite::Error) -> RepoError {
    RepoError::new(RepoErrorKind::Technical)
        .with_op(op)
        .with_message(message)
        .with_cause(cause)
}

/// Wrap a database error without repository context
pub fn from_rusqlite(err: rusqlite::Error) -> RepoError {
    RepoError::new(RepoErrorKind::Technical)
        .with_op("sqlite")
        .with_message(err.to_string())
        .with_cause(err)
}

/// Create a migration error
pub fn migration_error(migration_id: &str, cause: rusqlite::Error) -> RepoError {
    RepoError::new(RepoErrorKind::Technical)
        .with_op("migration")
        .with_message(format!("Migration {} failed", migration_id))
        .with_cause(cause)
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> RepoError {
    RepoError::new(RepoErrorKind::IllegalState)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: recorded {}, embedded {}",
            migration_id, expected, actual
        ))
}

/// Create a configuration error
pub fn config_error(reason: impl Into<String>) -> RepoError {
    RepoError::new(RepoErrorKind::Config)
        .with_op("config")
        .with_message(reason)
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> RepoError {
    RepoError::new(RepoErrorKind::Io)
        .with_op(operation)
        .with_message(err.to_string())
        .with_cause(err)
}
