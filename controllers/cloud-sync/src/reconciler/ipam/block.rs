//! Block diff applier

use super::super::{ApplyReport, Reconciler};
use crate::error::SyncError;
use crate::reconcile_helpers::{adopt_block, block_adoption_match, claim_identity, merge_cloud_block, take_first_match};
use cloud_provider::{BlockSyncResult, CloudProvider, ProviderError};
use ipam_model::{Block, CloudConnection, CloudTracked, ConflictResolution};
use ipam_store::{AllocationFilter, BlockFilter};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Pulls blocks for the connection and applies them to the store.
    /// Pools must have been synced first so cloud blocks resolve their pool.
    pub async fn sync_blocks(&self, connection: &CloudConnection) -> Result<ApplyReport, SyncError> {
        let provider = self.provider_for(connection)?;
        if !provider.supports_blocks() {
            let error_msg = format!("provider '{}' does not support blocks", connection.provider);
            error!("{}", error_msg);
            return Err(ProviderError::Unsupported(error_msg).into());
        }

        info!("Syncing blocks for connection {} ({})", connection.name, connection.id);
        let result = provider
            .sync_blocks(connection, self.store.as_ref())
            .await
            .map_err(|e| {
                error!("Failed to pull blocks for connection {}: {}", connection.id, e);
                e
            })?;
        self.apply_block_diffs(connection, provider.as_ref(), result).await
    }

    /// Applies a block pull result to the store.
    ///
    /// Only blocks already linked to this connection are matched by external
    /// id; unlinked live blocks of the organization are adoption candidates.
    pub async fn apply_block_diffs(
        &self,
        connection: &CloudConnection,
        provider: &dyn CloudProvider,
        result: BlockSyncResult,
    ) -> Result<ApplyReport, SyncError> {
        let BlockSyncResult {
            create,
            update,
            current_external_ids,
        } = result;
        let cloud_wins = connection.conflict_resolution == ConflictResolution::Cloud;
        let mut report = ApplyReport::default();

        let existing = self
            .store
            .list_blocks_including_deleted(&BlockFilter::organization(connection.organization_id))
            .await?;
        let mut by_external_id: HashMap<String, Block> = HashMap::new();
        let mut candidates: Vec<Block> = Vec::new();
        for block in existing {
            match block.identity.external_id().map(str::to_string) {
                Some(external_id) if block.identity.is_connection(connection.id) => {
                    by_external_id.insert(external_id, block);
                }
                Some(_) => {}
                None if block.is_adoptable() => candidates.push(block),
                None => {}
            }
        }

        for mut incoming in create {
            let Some(external_id) = incoming.identity.external_id().map(str::to_string) else {
                warn!("Skipping block '{}' reported without an external id", incoming.name);
                report.skipped += 1;
                continue;
            };
            if incoming.organization_id.is_nil() {
                incoming.organization_id = connection.organization_id;
            }
            claim_identity(&mut incoming.identity, connection);

            if let Some(existing) = by_external_id.get(&external_id) {
                if !cloud_wins {
                    debug!("Block {} is already linked; keeping local row '{}'", external_id, existing.name);
                    report.skipped += 1;
                    continue;
                }
                let merged = merge_cloud_block(provider, existing, &incoming);
                if merged == *existing {
                    report.skipped += 1;
                    continue;
                }
                self.store.update_block(&merged).await?;
                info!("Updated block '{}' from cloud block {}", merged.name, external_id);
                report.updated += 1;
                by_external_id.insert(external_id, merged);
                continue;
            }

            if let Some(local) = take_first_match(&mut candidates, |c| block_adoption_match(&incoming, c)) {
                let adopted = adopt_block(provider, local, &incoming);
                self.store.update_block(&adopted).await?;
                info!("Adopted local block '{}' as cloud block {}", adopted.name, external_id);
                report.adopted += 1;
                by_external_id.insert(external_id, adopted);
                continue;
            }

            incoming.id = self.store.generate_id();
            self.store.create_block(&incoming).await?;
            info!("Created block '{}' ({}) from cloud block {}", incoming.name, incoming.cidr, external_id);
            report.created += 1;
            by_external_id.insert(external_id, incoming);
        }

        for incoming in update {
            if incoming.id.is_nil() {
                warn!("Skipping block update '{}' without a local id", incoming.name);
                report.skipped += 1;
                continue;
            }
            let current = self.store.get_block(incoming.id).await?;
            if current == incoming {
                report.skipped += 1;
                continue;
            }
            self.store.update_block(&incoming).await?;
            report.updated += 1;
        }

        match current_external_ids {
            Some(ids) => {
                let current: HashSet<String> = ids.into_iter().collect();
                self.prune_blocks(connection, &current, &mut report).await?;
            }
            None => debug!(
                "Provider did not report current blocks for connection {}; not pruning",
                connection.id
            ),
        }

        debug!("Block diff for connection {}: {:?}", connection.id, report);
        Ok(report)
    }

    async fn prune_blocks(
        &self,
        connection: &CloudConnection,
        current: &HashSet<String>,
        report: &mut ApplyReport,
    ) -> Result<(), SyncError> {
        let repush = connection.is_ipam_authoritative();
        let filter = BlockFilter::organization(connection.organization_id).connection(connection.id);
        for block in self.store.list_blocks(&filter).await? {
            let Some(external_id) = block.identity.external_id() else {
                continue;
            };
            if current.contains(external_id) {
                continue;
            }
            if repush {
                info!("Block '{}' ({}) is gone from the cloud; clearing it for re-push", block.name, external_id);
                self.clear_block_for_repush(connection, block).await?;
                report.cleared += 1;
            } else {
                info!("Block '{}' ({}) is gone from the cloud; deleting it", block.name, external_id);
                self.delete_block_cascade(connection, &block).await?;
                report.deleted += 1;
            }
        }
        Ok(())
    }

    /// Deletes a block and the connection's allocations referencing it
    pub(crate) async fn delete_block_cascade(&self, connection: &CloudConnection, block: &Block) -> Result<(), SyncError> {
        for allocation in self.store.list_allocations(&allocations_of(connection, block)).await? {
            self.store.delete_allocation(allocation.id).await?;
        }
        self.store.delete_block(block.id).await?;
        Ok(())
    }

    /// Drops the cloud id of a block and of the connection's allocations under it
    pub(crate) async fn clear_block_for_repush(&self, connection: &CloudConnection, mut block: Block) -> Result<(), SyncError> {
        for mut allocation in self.store.list_allocations(&allocations_of(connection, &block)).await? {
            if allocation.identity.has_external_id() {
                allocation.identity.clear_external_id();
                self.store.update_allocation(&allocation).await?;
            }
        }
        block.identity.clear_external_id();
        self.store.update_block(&block).await?;
        Ok(())
    }
}

fn allocations_of(connection: &CloudConnection, block: &Block) -> AllocationFilter {
    AllocationFilter::organization(connection.organization_id)
        .block(block)
        .connection(connection.id)
}
