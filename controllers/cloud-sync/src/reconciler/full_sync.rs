//! Full sync for one connection
//!
//! Order of a run:
//! 1. pools: pull + apply, then push (read-write only)
//! 2. blocks: pull + apply, then push
//! 3. allocations: pull under the connection's blocks + apply, then push
//! 4. cloud deletes, allocations then blocks then pools (read-write + ipam-wins)
//!
//! The connection is marked `syncing` before the first step and `success` or
//! `failed` (with the error message) when the run ends.

use super::{Reconciler, SyncReport};
use crate::error::SyncError;
use chrono::Utc;
use cloud_provider::{ProviderConfig, TierSelection};
use ipam_model::CloudConnection;
use ipam_store::{with_sync_lock, BlockFilter};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Result of a locked run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another run for the same connection held the lock
    Skipped,
}

impl Reconciler {
    /// Runs every enabled tier for the connection and records the outcome on it
    #[instrument(skip(self))]
    pub async fn run_sync_for_connection(&self, connection_id: Uuid) -> Result<SyncReport, SyncError> {
        let mut connection = self.store.get_connection(connection_id).await?;
        connection.mark_syncing(Utc::now());
        self.store.update_connection(&connection).await?;
        info!(
            "Starting sync for connection '{}' ({}) [{} / {}]",
            connection.name, connection.provider, connection.sync_mode, connection.conflict_resolution
        );

        let started = Instant::now();
        match self.run_phases(&connection).await {
            Ok(report) => {
                // Reload: the row may have been edited while the run was in flight
                let mut connection = self.store.get_connection(connection_id).await?;
                connection.mark_success();
                self.store.update_connection(&connection).await?;
                info!(
                    provider = %connection.provider,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    applied = report.applied_changes(),
                    pushed = report.pushed(),
                    "Sync completed for connection '{}'",
                    connection.name
                );
                Ok(report)
            }
            Err(e) => {
                error!("Sync failed for connection '{}': {}", connection.name, e);
                self.record_failure(connection_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Runs the sync under the connection's lock, bounded by `timeout`.
    ///
    /// Returns `Skipped` without touching the connection when another run
    /// holds the lock. A timed-out run is recorded as failed.
    pub async fn run_locked_sync(&self, connection_id: Uuid, timeout: Duration) -> Result<SyncOutcome, SyncError> {
        let run = with_sync_lock(self.store.as_ref(), connection_id, || {
            self.run_sync_for_connection(connection_id)
        });

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(Some(report))) => Ok(SyncOutcome::Completed(report)),
            Ok(Ok(None)) => {
                debug!("Sync for connection {} already running; skipping", connection_id);
                Ok(SyncOutcome::Skipped)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let err = SyncError::Timeout(timeout);
                error!("Sync for connection {} timed out after {:?}", connection_id, timeout);
                self.record_failure(connection_id, &err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn run_phases(&self, connection: &CloudConnection) -> Result<SyncReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let config = ProviderConfig::from_connection(connection)?;
        let requested = config.tiers();
        let tiers = TierSelection {
            pools: requested.pools && provider.supports_pools(),
            blocks: requested.blocks && provider.supports_blocks(),
            allocations: requested.allocations && provider.supports_allocations(),
        };
        if tiers != requested {
            debug!(
                "Provider '{}' does not support every requested tier; running {:?}",
                connection.provider, tiers
            );
        }
        let target_environment = config.environment_id()?;
        let mut report = SyncReport::default();

        if tiers.pools {
            report.pools = self.sync_pools(connection).await?;
            if connection.is_read_write() {
                match target_environment {
                    Some(environment_id) => {
                        report.pushed_pools = self.push_pools_to_cloud(connection, environment_id).await?;
                    }
                    None => warn!(
                        "Connection {} has no environment_id; skipping pool push",
                        connection.id
                    ),
                }
            }
        }

        if tiers.blocks {
            report.blocks = self.sync_blocks(connection).await?;
            if connection.is_read_write() {
                report.pushed_blocks = self.push_blocks_to_cloud(connection).await?;
            }
        }

        if tiers.allocations {
            let filter = BlockFilter::organization(connection.organization_id)
                .connection(connection.id)
                .provider(connection.provider.as_str());
            let blocks = self.store.list_blocks(&filter).await?;
            report.allocations = self.sync_allocations(connection, &blocks).await?;
            if connection.is_read_write() {
                report.pushed_allocations = self.push_allocations_to_cloud(connection).await?;
            }
        }

        if connection.is_ipam_authoritative() {
            if tiers.allocations {
                report.deleted_allocations = self.apply_allocation_deletes_in_cloud(connection).await?;
            }
            if tiers.blocks {
                report.deleted_blocks = self.apply_block_deletes_in_cloud(connection).await?;
            }
            if tiers.pools {
                report.deleted_pools = self.apply_pool_deletes_in_cloud(connection).await?;
            }
        }

        Ok(report)
    }

    /// Persists a failed status; store errors here are only logged
    async fn record_failure(&self, connection_id: Uuid, message: &str) {
        let mut connection = match self.store.get_connection(connection_id).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to load connection {} to record failure: {}", connection_id, e);
                return;
            }
        };
        connection.mark_failed(message);
        if let Err(e) = self.store.update_connection(&connection).await {
            error!("Failed to record sync failure for connection {}: {}", connection_id, e);
        }
    }
}
