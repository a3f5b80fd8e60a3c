//! Cloud provider errors

use ipam_store::StoreError;
use thiserror::Error;

/// Message fragments of provider errors that clear up on a later run:
/// overlap races, pool ranges still provisioning, orphaned allocation
/// releases and throttling.
const TRANSIENT_PATTERNS: &[&str] = &[
    "overlaps with an existing allocation",
    "not a subnet of any pool cidrs",
    "release orphaned allocation",
    "still provisioning",
    "requestlimitexceeded",
    "throttling",
    "rate exceeded",
];

/// Errors that can occur when talking to a cloud provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider configuration on the connection is missing or malformed
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// The cloud API rejected or failed a request
    #[error("Cloud API error: {0}")]
    Api(String),

    /// Cloud resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider does not implement the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Store lookup made by the provider failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ProviderError {
    /// Whether the error is expected to resolve by itself on a later run
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(message) => {
                let message = message.to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|pattern| message.contains(pattern))
            }
            _ => false,
        }
    }
}

/// Errors raised while registering providers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider id must not be empty")]
    EmptyId,

    #[error("provider '{0}' is already registered")]
    Duplicate(String),
}
