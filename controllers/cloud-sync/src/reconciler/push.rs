//! Push engine
//!
//! Creates local resources that have no cloud counterpart yet, top-down:
//! pools (parents first), then blocks inside pushed pools, then allocations
//! inside pushed blocks. A successful create stamps the local row with the
//! returned external id, so the next pull matches it instead of duplicating it.
//!
//! Transient cloud errors defer the item to a later run; any other error
//! aborts the run.

use super::{PushReport, Reconciler};
use crate::error::SyncError;
use cloud_provider::{push_capability, ProviderError};
use ipam_model::{cidr, Block, CloudConnection, CloudTracked, ConflictResolution, Pool, ProviderIdentity};
use ipam_store::{AllocationFilter, BlockFilter};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl Reconciler {
    /// Creates unlinked pools of `target_environment` in the cloud.
    ///
    /// A sub-pool is created once its parent has an external id; sub-pools
    /// whose parent never gets one are deferred.
    pub async fn push_pools_to_cloud(
        &self,
        connection: &CloudConnection,
        target_environment: Uuid,
    ) -> Result<PushReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            debug!("Provider '{}' cannot push; skipping pool push", connection.provider);
            return Ok(PushReport::default());
        };
        if !connection.is_read_write() {
            return Ok(PushReport::default());
        }

        let pools = self.store.list_pools_by_organization(connection.organization_id).await?;
        let mut external_ids: HashMap<Uuid, String> = pools
            .iter()
            .filter_map(|p| p.identity.external_id().map(|id| (p.id, id.to_string())))
            .collect();
        let mut pending: Vec<Pool> = pools
            .into_iter()
            .filter(|p| {
                p.environment_id == target_environment
                    && !p.identity.has_external_id()
                    && p.identity.connection_id.is_none_or(|id| id == connection.id)
            })
            .collect();

        info!(
            "Pushing {} pools for connection {} ({})",
            pending.len(),
            connection.name,
            connection.id
        );
        let mut report = PushReport::default();
        loop {
            let mut progressed = false;
            let mut waiting = Vec::new();
            for mut pool in pending {
                let parent_external_id = match pool.parent_pool_id {
                    None => None,
                    Some(parent) => match external_ids.get(&parent) {
                        Some(id) => Some(id.clone()),
                        None => {
                            waiting.push(pool);
                            continue;
                        }
                    },
                };

                match push
                    .create_pool_in_cloud(connection, &pool, parent_external_id.as_deref())
                    .await
                {
                    Ok(external_id) => {
                        pool.identity.stamp(&connection.provider, external_id.clone(), connection.id);
                        self.store.update_pool(&pool).await?;
                        info!("Created pool '{}' in cloud as {}", pool.name, external_id);
                        external_ids.insert(pool.id, external_id);
                        report.pushed += 1;
                        progressed = true;
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Deferring pool '{}': {}", pool.name, e);
                        report.deferred += 1;
                    }
                    Err(e) => return Err(push_failed("pool", &pool.name, e)),
                }
            }
            pending = waiting;
            if pending.is_empty() || !progressed {
                break;
            }
        }

        for pool in &pending {
            info!("Deferring pool '{}' until its parent pool exists in the cloud", pool.name);
        }
        report.deferred += pending.len();
        Ok(report)
    }

    /// Allocates unlinked blocks inside the connection's pushed pools.
    ///
    /// When local state is authoritative, orphan blocks of the pool's
    /// environment that fit inside the pool are pushed into it too.
    pub async fn push_blocks_to_cloud(&self, connection: &CloudConnection) -> Result<PushReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            debug!("Provider '{}' cannot push; skipping block push", connection.provider);
            return Ok(PushReport::default());
        };
        if !connection.is_read_write() {
            return Ok(PushReport::default());
        }
        let include_orphans = connection.conflict_resolution == ConflictResolution::Ipam;

        let mut report = PushReport::default();
        let pools = self.store.list_pools_by_organization(connection.organization_id).await?;
        for pool in pools.iter().filter(|p| p.is_linked_to(connection.id)) {
            let Some(pool_external_id) = pool.identity.external_id() else {
                continue;
            };

            let mut blocks = self.store.list_blocks(&BlockFilter::pool(pool.id)).await?;
            if include_orphans && !pool.cidr.is_empty() {
                let orphan_filter = BlockFilter::organization(connection.organization_id)
                    .environment(pool.environment_id)
                    .orphans();
                for orphan in self.store.list_blocks(&orphan_filter).await? {
                    if !orphan.identity.has_external_id()
                        && !blocks.iter().any(|b| b.id == orphan.id)
                        && fits_within(&pool.cidr, &orphan.cidr)
                    {
                        blocks.push(orphan);
                    }
                }
            }

            for mut block in blocks.into_iter().filter(|b| unlinked_for(connection, b.identity())) {
                if !pool.cidr.is_empty() && !fits_within(&pool.cidr, &block.cidr) {
                    warn!(
                        "Deferring block '{}': {} is not inside pool '{}' ({})",
                        block.name, block.cidr, pool.name, pool.cidr
                    );
                    report.deferred += 1;
                    continue;
                }

                match push.allocate_block_in_cloud(connection, pool_external_id, &block).await {
                    Ok(external_id) => {
                        block.identity.stamp(&connection.provider, external_id.clone(), connection.id);
                        if block.pool_id.is_none() {
                            block.pool_id = Some(pool.id);
                        }
                        if block.environment_id.is_none() {
                            block.environment_id = Some(pool.environment_id);
                        }
                        self.store.update_block(&block).await?;
                        info!(
                            "Allocated block '{}' in cloud pool {} as {}",
                            block.name, pool_external_id, external_id
                        );
                        report.pushed += 1;
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Deferring block '{}': {}", block.name, e);
                        report.deferred += 1;
                    }
                    Err(e) => return Err(push_failed("block", &block.name, e)),
                }
            }
        }
        Ok(report)
    }

    /// Creates unlinked allocations inside the connection's pushed blocks
    pub async fn push_allocations_to_cloud(&self, connection: &CloudConnection) -> Result<PushReport, SyncError> {
        let provider = self.provider_for(connection)?;
        let Some(push) = push_capability(provider.as_ref()) else {
            debug!("Provider '{}' cannot push; skipping allocation push", connection.provider);
            return Ok(PushReport::default());
        };
        if !connection.is_read_write() {
            return Ok(PushReport::default());
        }

        let mut report = PushReport::default();
        let filter = BlockFilter::organization(connection.organization_id).connection(connection.id);
        let blocks: Vec<Block> = self
            .store
            .list_blocks(&filter)
            .await?
            .into_iter()
            .filter(|b| b.identity.has_external_id())
            .collect();

        for block in &blocks {
            let Some(block_external_id) = block.identity.external_id() else {
                continue;
            };
            let allocation_filter = AllocationFilter::organization(connection.organization_id).block(block);
            let allocations = self.store.list_allocations(&allocation_filter).await?;

            for mut allocation in allocations
                .into_iter()
                .filter(|a| unlinked_for(connection, a.identity()))
            {
                if !block.cidr.is_empty() && !fits_within(&block.cidr, &allocation.cidr) {
                    warn!(
                        "Deferring allocation '{}': {} is not inside block '{}' ({})",
                        allocation.name, allocation.cidr, block.name, block.cidr
                    );
                    report.deferred += 1;
                    continue;
                }

                match push
                    .create_allocation_in_cloud(connection, block_external_id, &allocation)
                    .await
                {
                    Ok(external_id) => {
                        allocation
                            .identity
                            .stamp(&connection.provider, external_id.clone(), connection.id);
                        if allocation.block_cidr.is_empty() {
                            allocation.block_cidr = block.cidr.clone();
                        }
                        self.store.update_allocation(&allocation).await?;
                        info!(
                            "Created allocation '{}' in cloud block {} as {}",
                            allocation.name, block_external_id, external_id
                        );
                        report.pushed += 1;
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Deferring allocation '{}': {}", allocation.name, e);
                        report.deferred += 1;
                    }
                    Err(e) => return Err(push_failed("allocation", &allocation.name, e)),
                }
            }
        }
        Ok(report)
    }
}

/// Not yet in the cloud, and not claimed by another connection
fn unlinked_for(connection: &CloudConnection, identity: &ProviderIdentity) -> bool {
    !identity.has_external_id() && identity.connection_id.is_none_or(|id| id == connection.id)
}

/// Containment pre-check; an unparsable CIDR never fits
fn fits_within(supernet: &str, cidr: &str) -> bool {
    match cidr::contains(supernet, cidr) {
        Ok(contained) => contained,
        Err(e) => {
            warn!("Cannot check {} against {}: {}", cidr, supernet, e);
            false
        }
    }
}

fn push_failed(kind: &'static str, name: &str, source: ProviderError) -> SyncError {
    error!("Failed to push {} '{}': {}", kind, name, source);
    SyncError::Push {
        kind,
        name: name.to_string(),
        source,
    }
}
