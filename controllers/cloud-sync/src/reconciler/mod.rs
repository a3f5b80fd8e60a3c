//! Reconciliation logic for cloud connections.
//!
//! This module is organized by sync phase:
//! - `ipam`: diff applier per tier (pools, blocks, allocations)
//! - `push`: creates local-only resources in the cloud
//! - `cloud_delete`: removes soft-deleted resources from the cloud, then locally
//! - `full_sync`: one complete run for one connection, with status bookkeeping

pub mod cloud_delete;
pub mod full_sync;
pub mod ipam;
pub mod push;

use crate::error::SyncError;
use cloud_provider::{CloudProvider, ProviderRegistry};
use ipam_model::CloudConnection;
use ipam_store::Storer;
use std::sync::Arc;
use tracing::error;

pub use full_sync::SyncOutcome;

/// Reconciles cloud connections against the local store.
///
/// Cheap to clone; clones share the store and registry.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) store: Arc<dyn Storer>,
    pub(crate) registry: Arc<ProviderRegistry>,
}

/// What the diff applier did for one tier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub adopted: usize,
    /// Observed entries left untouched (local row wins, or no change)
    pub skipped: usize,
    pub deleted: usize,
    pub cleared: usize,
}

impl ApplyReport {
    /// Number of rows written
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.adopted + self.deleted + self.cleared
    }
}

/// What the push engine did for one tier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    /// Items left for a later run (failed pre-check, transient error, unresolved parent)
    pub deferred: usize,
}

/// What the cloud-delete propagator did for one tier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted_in_cloud: usize,
    /// Cloud call skipped (id not a cloud resource, or already gone)
    pub skipped_in_cloud: usize,
    pub purged: usize,
}

/// Summary of one full sync run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pools: ApplyReport,
    pub blocks: ApplyReport,
    pub allocations: ApplyReport,
    pub pushed_pools: PushReport,
    pub pushed_blocks: PushReport,
    pub pushed_allocations: PushReport,
    pub deleted_pools: DeleteReport,
    pub deleted_blocks: DeleteReport,
    pub deleted_allocations: DeleteReport,
}

impl SyncReport {
    /// Local rows written by the diff applier across all tiers
    pub fn applied_changes(&self) -> usize {
        self.pools.changes() + self.blocks.changes() + self.allocations.changes()
    }

    /// Resources created in the cloud across all tiers
    pub fn pushed(&self) -> usize {
        self.pushed_pools.pushed + self.pushed_blocks.pushed + self.pushed_allocations.pushed
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: Arc<dyn Storer>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn Storer> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Provider registered for the connection
    pub(crate) fn provider_for(&self, connection: &CloudConnection) -> Result<Arc<dyn CloudProvider>, SyncError> {
        self.registry.get(&connection.provider).ok_or_else(|| {
            error!(
                "Provider '{}' for connection {} is not registered",
                connection.provider, connection.id
            );
            SyncError::ProviderNotRegistered(connection.provider.clone())
        })
    }
}
