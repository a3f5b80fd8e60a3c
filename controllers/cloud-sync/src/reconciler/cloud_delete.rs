//! Cloud-delete propagator
//!
//! Soft-deleted rows still linked to a connection are removed from the cloud
//! and then hard-deleted locally. Only runs when local state is authoritative
//! (read-write with ipam-wins) and the provider can push.
//!
//! Callers run allocations, then blocks, then pools so children leave the
//! cloud before their parents.

use super::{DeleteReport, Reconciler};
use crate::error::SyncError;
use cloud_provider::{push_capability, ProviderError};
use ipam_model::CloudConnection;
use tracing::{debug, error, info};

impl Reconciler {
    pub async fn apply_allocation_deletes_in_cloud(&self, connection: &CloudConnection) -> Result<DeleteReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            return Ok(DeleteReport::default());
        };
        if !connection.is_ipam_authoritative() {
            return Ok(DeleteReport::default());
        }

        let mut report = DeleteReport::default();
        for allocation in self.store.list_allocations_pending_cloud_delete(connection.id).await? {
            if let Some(external_id) = allocation.identity.external_id() {
                let outcome = push.delete_allocation_in_cloud(connection, external_id).await;
                if tolerate_missing(outcome, "allocation", external_id)? {
                    report.deleted_in_cloud += 1;
                } else {
                    report.skipped_in_cloud += 1;
                }
            }
            self.store.delete_allocation(allocation.id).await?;
            info!("Purged allocation '{}' ({})", allocation.name, allocation.id);
            report.purged += 1;
        }
        Ok(report)
    }

    /// Block ids the provider does not recognise as its own are purged
    /// locally without a cloud call.
    pub async fn apply_block_deletes_in_cloud(&self, connection: &CloudConnection) -> Result<DeleteReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            return Ok(DeleteReport::default());
        };
        if !connection.is_ipam_authoritative() {
            return Ok(DeleteReport::default());
        }

        let mut report = DeleteReport::default();
        for block in self.store.list_blocks_pending_cloud_delete(connection.id).await? {
            if let Some(external_id) = block.identity.external_id() {
                if !push.is_cloud_block_id(external_id) {
                    debug!("Block {} is not a cloud block id; purging locally only", external_id);
                    report.skipped_in_cloud += 1;
                } else {
                    let outcome = push.delete_block_in_cloud(connection, external_id).await;
                    if tolerate_missing(outcome, "block", external_id)? {
                        report.deleted_in_cloud += 1;
                    } else {
                        report.skipped_in_cloud += 1;
                    }
                }
            }
            self.store.delete_block(block.id).await?;
            info!("Purged block '{}' ({})", block.name, block.id);
            report.purged += 1;
        }
        Ok(report)
    }

    pub async fn apply_pool_deletes_in_cloud(&self, connection: &CloudConnection) -> Result<DeleteReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            return Ok(DeleteReport::default());
        };
        if !connection.is_ipam_authoritative() {
            return Ok(DeleteReport::default());
        }

        let mut report = DeleteReport::default();
        for pool in self.store.list_pools_pending_cloud_delete(connection.id).await? {
            if let Some(external_id) = pool.identity.external_id() {
                let outcome = push.delete_pool_in_cloud(connection, external_id).await;
                if tolerate_missing(outcome, "pool", external_id)? {
                    report.deleted_in_cloud += 1;
                } else {
                    report.skipped_in_cloud += 1;
                }
            }
            self.store.delete_pool(pool.id).await?;
            info!("Purged pool '{}' ({})", pool.name, pool.id);
            report.purged += 1;
        }
        Ok(report)
    }
}

/// `Ok(true)` when deleted, `Ok(false)` when the cloud no longer had it
fn tolerate_missing(outcome: Result<(), ProviderError>, kind: &str, external_id: &str) -> Result<bool, SyncError> {
    match outcome {
        Ok(()) => {
            info!("Deleted {} {} from cloud", kind, external_id);
            Ok(true)
        }
        Err(ProviderError::NotFound(_)) => {
            info!("{} {} already gone from cloud", kind, external_id);
            Ok(false)
        }
        Err(e) => {
            error!("Failed to delete {} {} from cloud: {}", kind, external_id, e);
            Err(e.into())
        }
    }
}
