//! Pool diff applier

use super::super::{ApplyReport, Reconciler};
use crate::error::SyncError;
use crate::reconcile_helpers::{
    adopt_pool, claim_identity, merge_cloud_pool, parents_first, pool_adoption_match, take_first_match,
};
use cloud_provider::{CloudProvider, PoolSyncResult, ProviderError};
use ipam_model::{CloudConnection, CloudTracked, ConflictResolution, Pool};
use ipam_store::BlockFilter;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl Reconciler {
    /// Pulls pools for the connection and applies them to the store
    pub async fn sync_pools(&self, connection: &CloudConnection) -> Result<ApplyReport, SyncError> {
        let provider = self.provider_for(connection)?;
        if !provider.supports_pools() {
            let error_msg = format!("provider '{}' does not support pools", connection.provider);
            error!("{}", error_msg);
            return Err(ProviderError::Unsupported(error_msg).into());
        }

        info!("Syncing pools for connection {} ({})", connection.name, connection.id);
        let result = provider.sync_pools(connection).await.map_err(|e| {
            error!("Failed to pull pools for connection {}: {}", connection.id, e);
            e
        })?;
        self.apply_pool_diffs(connection, provider.as_ref(), result).await
    }

    /// Applies a pool pull result to the store.
    ///
    /// Local pools are indexed by external id across the whole organization
    /// (including soft-deleted rows), so a pool seen through a second
    /// connection is re-linked rather than duplicated. Sub-pools are applied
    /// after their parents and linked to them by the parent's cloud id.
    pub async fn apply_pool_diffs(
        &self,
        connection: &CloudConnection,
        provider: &dyn CloudProvider,
        result: PoolSyncResult,
    ) -> Result<ApplyReport, SyncError> {
        let PoolSyncResult {
            create,
            update,
            current_external_ids,
        } = result;
        let cloud_wins = connection.conflict_resolution == ConflictResolution::Cloud;
        let mut report = ApplyReport::default();

        let existing = self
            .store
            .list_pools_by_organization_including_deleted(connection.organization_id)
            .await?;
        let mut by_external_id: HashMap<String, Pool> = HashMap::new();
        let mut candidates: Vec<Pool> = Vec::new();
        for pool in existing {
            match pool.identity.external_id().map(str::to_string) {
                Some(external_id) => {
                    by_external_id.insert(external_id, pool);
                }
                None if pool.is_adoptable() => candidates.push(pool),
                None => {}
            }
        }

        for mut incoming in parents_first(create) {
            let Some(external_id) = incoming.identity.external_id().map(str::to_string) else {
                warn!("Skipping pool '{}' reported without an external id", incoming.name);
                report.skipped += 1;
                continue;
            };
            if incoming.organization_id.is_nil() {
                incoming.organization_id = connection.organization_id;
            }
            claim_identity(&mut incoming.identity, connection);
            if let Some(parent_external_id) = incoming.parent_external_id.take() {
                match by_external_id.get(&parent_external_id) {
                    Some(parent) => incoming.parent_pool_id = Some(parent.id),
                    None => debug!(
                        "Parent pool {} of pool {} is not known locally; leaving it top-level",
                        parent_external_id, external_id
                    ),
                }
            }

            if let Some(existing) = by_external_id.get(&external_id) {
                if !cloud_wins {
                    debug!("Pool {} is already linked; keeping local row '{}'", external_id, existing.name);
                    report.skipped += 1;
                    continue;
                }
                let merged = merge_cloud_pool(provider, existing, &incoming);
                if merged == *existing {
                    report.skipped += 1;
                    continue;
                }
                self.store.update_pool(&merged).await?;
                info!("Updated pool '{}' from cloud pool {}", merged.name, external_id);
                report.updated += 1;
                by_external_id.insert(external_id, merged);
                continue;
            }

            if let Some(local) = take_first_match(&mut candidates, |c| pool_adoption_match(provider, &incoming, c)) {
                let adopted = adopt_pool(provider, local, &incoming);
                self.store.update_pool(&adopted).await?;
                info!("Adopted local pool '{}' as cloud pool {}", adopted.name, external_id);
                report.adopted += 1;
                by_external_id.insert(external_id, adopted);
                continue;
            }

            incoming.id = self.store.generate_id();
            self.store.create_pool(&incoming).await?;
            info!("Created pool '{}' ({}) from cloud pool {}", incoming.name, incoming.cidr, external_id);
            report.created += 1;
            by_external_id.insert(external_id, incoming);
        }

        for incoming in update {
            if incoming.id.is_nil() {
                warn!("Skipping pool update '{}' without a local id", incoming.name);
                report.skipped += 1;
                continue;
            }
            let current = self.store.get_pool(incoming.id).await?;
            if current == incoming {
                report.skipped += 1;
                continue;
            }
            self.store.update_pool(&incoming).await?;
            report.updated += 1;
        }

        match current_external_ids {
            Some(ids) => {
                let current: HashSet<String> = ids.into_iter().collect();
                self.prune_pools(connection, &current, &mut report).await?;
            }
            None => debug!(
                "Provider did not report current pools for connection {}; not pruning",
                connection.id
            ),
        }

        debug!("Pool diff for connection {}: {:?}", connection.id, report);
        Ok(report)
    }

    /// Handles linked pools missing from the cloud: cleared for re-push when
    /// local state is authoritative, deleted otherwise.
    async fn prune_pools(
        &self,
        connection: &CloudConnection,
        current: &HashSet<String>,
        report: &mut ApplyReport,
    ) -> Result<(), SyncError> {
        let repush = connection.is_ipam_authoritative();
        let pools = self.store.list_pools_by_organization(connection.organization_id).await?;
        let mut removed: HashSet<Uuid> = HashSet::new();
        for pool in pools {
            if !pool.is_linked_to(connection.id) || removed.contains(&pool.id) {
                continue;
            }
            let Some(external_id) = pool.identity.external_id() else {
                continue;
            };
            if current.contains(external_id) {
                continue;
            }
            if repush {
                info!("Pool '{}' ({}) is gone from the cloud; clearing it for re-push", pool.name, external_id);
                self.clear_pool_for_repush(connection, pool).await?;
                report.cleared += 1;
            } else {
                info!("Pool '{}' ({}) is gone from the cloud; deleting it", pool.name, external_id);
                removed.extend(self.delete_pool_cascade(connection, &pool).await?);
                report.deleted += 1;
            }
        }
        Ok(())
    }

    /// Deletes a pool with the connection's sub-pools and blocks beneath it
    /// (allocations included). Blocks owned elsewhere become orphans and
    /// sub-pools owned elsewhere move up to the deleted pool's parent.
    /// Returns the ids of the deleted pools.
    pub(crate) async fn delete_pool_cascade(&self, connection: &CloudConnection, pool: &Pool) -> Result<Vec<Uuid>, SyncError> {
        let pools = self.store.list_pools_by_organization(pool.organization_id).await?;
        let mut doomed = vec![pool.id];
        let mut survivors: Vec<Pool> = Vec::new();
        let mut next = 0;
        while next < doomed.len() {
            let parent_id = doomed[next];
            next += 1;
            for child in pools.iter().filter(|p| p.parent_pool_id == Some(parent_id)) {
                if doomed.contains(&child.id) {
                    continue;
                }
                if child.identity.is_connection(connection.id) {
                    doomed.push(child.id);
                } else {
                    survivors.push(child.clone());
                }
            }
        }

        for &pool_id in doomed.iter().rev() {
            let blocks = self.store.list_blocks(&BlockFilter::pool(pool_id)).await?;
            for mut block in blocks {
                if block.identity.is_connection(connection.id) {
                    self.delete_block_cascade(connection, &block).await?;
                } else {
                    block.pool_id = None;
                    self.store.update_block(&block).await?;
                }
            }
            self.store.delete_pool(pool_id).await?;
        }

        // Old parents must be gone first; a re-parented child overlaps them.
        for mut child in survivors {
            child.parent_pool_id = pool.parent_pool_id;
            self.store.update_pool(&child).await?;
            info!("Moved sub-pool '{}' up after deleting pool '{}'", child.name, pool.name);
        }
        Ok(doomed)
    }

    /// Drops the pool's cloud id, and those of the connection's blocks and
    /// allocations under it, so the push pass recreates the whole subtree.
    pub(crate) async fn clear_pool_for_repush(&self, connection: &CloudConnection, mut pool: Pool) -> Result<(), SyncError> {
        let blocks = self.store.list_blocks(&BlockFilter::pool(pool.id)).await?;
        for block in blocks {
            if block.is_linked_to(connection.id) {
                self.clear_block_for_repush(connection, block).await?;
            }
        }
        pool.identity.clear_external_id();
        self.store.update_pool(&pool).await?;
        Ok(())
    }
}
