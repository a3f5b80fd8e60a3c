//! Store errors

use thiserror::Error;

/// Errors that can occur when reading or writing the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists or violates a uniqueness / overlap rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Row is malformed (e.g. nil id, unparsable CIDR)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal lock was poisoned
    #[error("Lock error: {0}")]
    Lock(String),

    /// Seed file could not be read or parsed
    #[error("Seed error: {0}")]
    Seed(String),
}
