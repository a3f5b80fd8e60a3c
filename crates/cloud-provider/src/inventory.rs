//! Cloud inventory
//!
//! `CloudInventory` is a provider-neutral picture of what exists in a cloud:
//! pools, blocks (VPC-like ranges) and allocations (subnets), keyed by
//! external id. It knows how to turn itself into the three pull results.
//!
//! `InventoryProvider` is a pull-only provider that reads an inventory from
//! the JSON file named by the connection's `inventory_path`.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::{AllocationSyncResult, BlockSyncResult, PoolSyncResult, SyncResult};
use crate::naming::display_name;
use crate::provider_trait::CloudProvider;
use ipam_model::{Allocation, Block, CloudConnection, Pool, ProviderIdentity};
use ipam_store::Storer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudPool {
    pub external_id: String,
    /// Name tag; reported as `"<external id> (<name>)"`
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_external_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudBlock {
    pub external_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_external_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudAllocation {
    pub external_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
    pub block_external_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudInventory {
    #[serde(default)]
    pub pools: Vec<CloudPool>,
    #[serde(default)]
    pub blocks: Vec<CloudBlock>,
    #[serde(default)]
    pub allocations: Vec<CloudAllocation>,
}

impl CloudInventory {
    /// Every cloud pool as a `create` entry in `environment_id`; sub-pools
    /// carry their parent's cloud id for the engine to resolve
    pub fn pool_result(&self, provider_id: &str, connection: &CloudConnection, environment_id: Uuid) -> PoolSyncResult {
        let create = self
            .pools
            .iter()
            .map(|cloud| {
                Pool::new(
                    connection.organization_id,
                    environment_id,
                    display_name(&cloud.external_id, &cloud.name),
                    cloud.cidr.clone(),
                )
                .with_identity(ProviderIdentity::linked(provider_id, cloud.external_id.clone(), connection.id))
                .with_parent_external_id(cloud.parent_external_id.clone())
            })
            .collect();
        let current = self.pools.iter().map(|p| p.external_id.clone()).collect();
        SyncResult::observed(create, current)
    }

    /// Every cloud block, with `pool_id` resolved against pools already in `store`.
    ///
    /// Blocks whose pool is unknown locally are reported as orphans in
    /// `fallback_environment`.
    pub async fn block_result(
        &self,
        provider_id: &str,
        connection: &CloudConnection,
        store: &dyn Storer,
        fallback_environment: Option<Uuid>,
    ) -> Result<BlockSyncResult, ProviderError> {
        let pools = store
            .list_pools_by_organization_including_deleted(connection.organization_id)
            .await?;
        let pools_by_external_id: HashMap<&str, &Pool> = pools
            .iter()
            .filter(|p| p.identity.is_connection(connection.id))
            .filter_map(|p| p.identity.external_id().map(|id| (id, p)))
            .collect();

        let mut create = Vec::with_capacity(self.blocks.len());
        for cloud in &self.blocks {
            let pool = cloud
                .pool_external_id
                .as_deref()
                .and_then(|id| pools_by_external_id.get(id));
            let mut block = Block::new(connection.organization_id, cloud.name.clone(), cloud.cidr.clone())
                .with_identity(ProviderIdentity::linked(provider_id, cloud.external_id.clone(), connection.id));
            match pool {
                Some(pool) => {
                    block.pool_id = Some(pool.id);
                    block.environment_id = Some(pool.environment_id);
                }
                None => {
                    debug!("Cloud block {} has no local pool", cloud.external_id);
                    block.environment_id = fallback_environment;
                }
            }
            create.push(block);
        }
        let current = self.blocks.iter().map(|b| b.external_id.clone()).collect();
        Ok(SyncResult::observed(create, current))
    }

    /// Cloud allocations under the given blocks
    pub fn allocation_result(&self, provider_id: &str, connection: &CloudConnection, blocks: &[Block]) -> AllocationSyncResult {
        let blocks_by_external_id: HashMap<&str, &Block> = blocks
            .iter()
            .filter_map(|b| b.identity.external_id().map(|id| (id, b)))
            .collect();

        let mut create = Vec::new();
        let mut current = Vec::new();
        for cloud in &self.allocations {
            let Some(block) = blocks_by_external_id.get(cloud.block_external_id.as_str()) else {
                continue;
            };
            create.push(
                Allocation::new(connection.organization_id, cloud.name.clone(), block.name.clone(), cloud.cidr.clone())
                    .with_block_cidr(block.cidr.clone())
                    .with_identity(ProviderIdentity::linked(provider_id, cloud.external_id.clone(), connection.id)),
            );
            current.push(cloud.external_id.clone());
        }
        SyncResult::observed(create, current)
    }
}

/// Pull-only provider backed by a JSON inventory file
#[derive(Debug, Clone)]
pub struct InventoryProvider {
    id: String,
}

impl Default for InventoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryProvider {
    pub const ID: &'static str = "inventory";

    pub fn new() -> Self {
        Self {
            id: Self::ID.to_string(),
        }
    }

    async fn load(&self, connection: &CloudConnection) -> Result<(ProviderConfig, CloudInventory), ProviderError> {
        let config = ProviderConfig::from_connection(connection)?;
        let path = config.require_inventory_path()?;
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to read inventory {}: {}", path.display(), e)))?;
        let inventory = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Api(format!("failed to parse inventory {}: {}", path.display(), e)))?;
        Ok((config, inventory))
    }
}

#[async_trait::async_trait]
impl CloudProvider for InventoryProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn supports_pools(&self) -> bool {
        true
    }

    fn supports_blocks(&self) -> bool {
        true
    }

    fn supports_allocations(&self) -> bool {
        true
    }

    async fn sync_pools(&self, connection: &CloudConnection) -> Result<PoolSyncResult, ProviderError> {
        let (config, inventory) = self.load(connection).await?;
        let environment_id = config.require_environment()?;
        Ok(inventory.pool_result(&self.id, connection, environment_id))
    }

    async fn sync_blocks(&self, connection: &CloudConnection, store: &dyn Storer) -> Result<BlockSyncResult, ProviderError> {
        let (config, inventory) = self.load(connection).await?;
        inventory
            .block_result(&self.id, connection, store, config.environment_id()?)
            .await
    }

    async fn sync_allocations(
        &self,
        connection: &CloudConnection,
        _store: &dyn Storer,
        blocks: &[Block],
    ) -> Result<AllocationSyncResult, ProviderError> {
        let (_, inventory) = self.load(connection).await?;
        Ok(inventory.allocation_result(&self.id, connection, blocks))
    }
}
