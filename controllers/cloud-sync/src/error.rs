//! Sync engine error types.
//!
//! Wraps the store, provider and model errors a run can hit, plus the
//! engine's own failure cases. Any of these aborts the current run and is
//! persisted on the connection as its `last_sync_error`.

use cloud_provider::ProviderError;
use ipam_model::ModelError;
use ipam_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Cloud provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid model value (e.g. unparsable CIDR)
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Connection names a provider that is not registered
    #[error("Provider '{0}' is not registered")]
    ProviderNotRegistered(String),

    /// A push to the cloud failed with a non-transient error
    #[error("Push {kind} '{name}' failed: {source}")]
    Push {
        kind: &'static str,
        name: String,
        #[source]
        source: ProviderError,
    },

    /// Invalid process or connection configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run exceeded its time budget
    #[error("Sync timed out after {0:?}")]
    Timeout(Duration),
}
