//! Model validation errors

use thiserror::Error;

/// Errors raised while validating model values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A CIDR string could not be parsed
    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    /// A cloud connection has out-of-range or missing settings
    #[error("Invalid connection settings: {0}")]
    InvalidConnection(String),
}
