//! Allocation diff applier

use super::super::{ApplyReport, Reconciler};
use crate::error::SyncError;
use crate::reconcile_helpers::{
    adopt_allocation, allocation_adoption_match, claim_identity, merge_cloud_allocation, take_first_match,
};
use cloud_provider::{AllocationSyncResult, CloudProvider, ProviderError};
use ipam_model::{Allocation, Block, CloudConnection, CloudTracked, ConflictResolution};
use ipam_store::AllocationFilter;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Pulls allocations under `blocks` and applies them to the store.
    ///
    /// With no blocks there is nothing to pull under, so nothing is pulled
    /// and nothing is pruned.
    pub async fn sync_allocations(&self, connection: &CloudConnection, blocks: &[Block]) -> Result<ApplyReport, SyncError> {
        let provider = self.provider_for(connection)?;
        if !provider.supports_allocations() {
            let error_msg = format!("provider '{}' does not support allocations", connection.provider);
            error!("{}", error_msg);
            return Err(ProviderError::Unsupported(error_msg).into());
        }
        if blocks.is_empty() {
            debug!("No blocks linked to connection {}; skipping allocation pull", connection.id);
            return Ok(ApplyReport::default());
        }

        info!(
            "Syncing allocations for connection {} ({}) across {} blocks",
            connection.name,
            connection.id,
            blocks.len()
        );
        let result = provider
            .sync_allocations(connection, self.store.as_ref(), blocks)
            .await
            .map_err(|e| {
                error!("Failed to pull allocations for connection {}: {}", connection.id, e);
                e
            })?;
        self.apply_allocation_diffs(connection, provider.as_ref(), result).await
    }

    /// Applies an allocation pull result to the store
    pub async fn apply_allocation_diffs(
        &self,
        connection: &CloudConnection,
        provider: &dyn CloudProvider,
        result: AllocationSyncResult,
    ) -> Result<ApplyReport, SyncError> {
        let AllocationSyncResult {
            create,
            update,
            current_external_ids,
        } = result;
        let cloud_wins = connection.conflict_resolution == ConflictResolution::Cloud;
        let mut report = ApplyReport::default();

        let existing = self
            .store
            .list_allocations_including_deleted(&AllocationFilter::organization(connection.organization_id))
            .await?;
        let mut by_external_id: HashMap<String, Allocation> = HashMap::new();
        let mut candidates: Vec<Allocation> = Vec::new();
        for allocation in existing {
            match allocation.identity.external_id().map(str::to_string) {
                Some(external_id) if allocation.identity.is_connection(connection.id) => {
                    by_external_id.insert(external_id, allocation);
                }
                Some(_) => {}
                None if allocation.is_adoptable() => candidates.push(allocation),
                None => {}
            }
        }

        for mut incoming in create {
            let Some(external_id) = incoming.identity.external_id().map(str::to_string) else {
                warn!("Skipping allocation '{}' reported without an external id", incoming.name);
                report.skipped += 1;
                continue;
            };
            if incoming.organization_id.is_nil() {
                incoming.organization_id = connection.organization_id;
            }
            claim_identity(&mut incoming.identity, connection);

            if let Some(existing) = by_external_id.get(&external_id) {
                if !cloud_wins {
                    debug!(
                        "Allocation {} is already linked; keeping local row '{}'",
                        external_id, existing.name
                    );
                    report.skipped += 1;
                    continue;
                }
                let merged = merge_cloud_allocation(provider, existing, &incoming);
                if merged == *existing {
                    report.skipped += 1;
                    continue;
                }
                self.store.update_allocation(&merged).await?;
                info!("Updated allocation '{}' from cloud allocation {}", merged.name, external_id);
                report.updated += 1;
                by_external_id.insert(external_id, merged);
                continue;
            }

            if let Some(local) =
                take_first_match(&mut candidates, |c| allocation_adoption_match(provider, &incoming, c))
            {
                let adopted = adopt_allocation(provider, local, &incoming);
                self.store.update_allocation(&adopted).await?;
                info!("Adopted local allocation '{}' as cloud allocation {}", adopted.name, external_id);
                report.adopted += 1;
                by_external_id.insert(external_id, adopted);
                continue;
            }

            incoming.id = self.store.generate_id();
            self.store.create_allocation(&incoming).await?;
            info!(
                "Created allocation '{}' ({}) in block '{}' from cloud allocation {}",
                incoming.name, incoming.cidr, incoming.block_name, external_id
            );
            report.created += 1;
            by_external_id.insert(external_id, incoming);
        }

        for incoming in update {
            if incoming.id.is_nil() {
                warn!("Skipping allocation update '{}' without a local id", incoming.name);
                report.skipped += 1;
                continue;
            }
            let current = self.store.get_allocation(incoming.id).await?;
            if current == incoming {
                report.skipped += 1;
                continue;
            }
            self.store.update_allocation(&incoming).await?;
            report.updated += 1;
        }

        match current_external_ids {
            Some(ids) => {
                let current: HashSet<String> = ids.into_iter().collect();
                self.prune_allocations(connection, &current, &mut report).await?;
            }
            None => debug!(
                "Provider did not report current allocations for connection {}; not pruning",
                connection.id
            ),
        }

        debug!("Allocation diff for connection {}: {:?}", connection.id, report);
        Ok(report)
    }

    async fn prune_allocations(
        &self,
        connection: &CloudConnection,
        current: &HashSet<String>,
        report: &mut ApplyReport,
    ) -> Result<(), SyncError> {
        let repush = connection.is_ipam_authoritative();
        let filter = AllocationFilter::organization(connection.organization_id).connection(connection.id);
        for mut allocation in self.store.list_allocations(&filter).await? {
            let Some(external_id) = allocation.identity.external_id().map(str::to_string) else {
                continue;
            };
            if current.contains(&external_id) {
                continue;
            }
            if repush {
                info!(
                    "Allocation '{}' ({}) is gone from the cloud; clearing it for re-push",
                    allocation.name, external_id
                );
                allocation.identity.clear_external_id();
                self.store.update_allocation(&allocation).await?;
                report.cleared += 1;
            } else {
                info!("Allocation '{}' ({}) is gone from the cloud; deleting it", allocation.name, external_id);
                self.store.delete_allocation(allocation.id).await?;
                report.deleted += 1;
            }
        }
        Ok(())
    }
}
