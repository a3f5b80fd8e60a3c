//! Provider traits
//!
//! `CloudProvider` is the pull side every integration implements.
//! `PushProvider` refines it with cloud create/delete operations; the engine
//! reaches it only through `CloudProvider::as_push`, so a pull-only provider
//! can never be asked to push.

use crate::error::ProviderError;
use crate::models::{AllocationSyncResult, BlockSyncResult, PoolSyncResult};
use crate::naming;
use ipam_model::{Allocation, Block, CloudConnection, Pool};
use ipam_store::Storer;

/// Pull operations and capabilities of a cloud integration
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Registry key, matched against `CloudConnection::provider`
    fn provider_id(&self) -> &str;

    fn supports_pools(&self) -> bool;
    fn supports_blocks(&self) -> bool;
    fn supports_allocations(&self) -> bool;

    async fn sync_pools(&self, connection: &CloudConnection) -> Result<PoolSyncResult, ProviderError>;

    /// Blocks are returned with `pool_id` resolved against pools already in `store`
    async fn sync_blocks(&self, connection: &CloudConnection, store: &dyn Storer) -> Result<BlockSyncResult, ProviderError>;

    /// Allocations of the given blocks (the connection's current blocks)
    async fn sync_allocations(
        &self,
        connection: &CloudConnection,
        store: &dyn Storer,
        blocks: &[Block],
    ) -> Result<AllocationSyncResult, ProviderError>;

    /// Whether a cloud-reported name and a local name denote the same resource
    fn names_match(&self, cloud_name: &str, local_name: &str) -> bool {
        naming::names_match(cloud_name, local_name)
    }

    /// Push capability, if this provider has one
    fn as_push(&self) -> Option<&dyn PushProvider> {
        None
    }
}

/// Cloud create/delete operations
///
/// Create operations return the external id assigned by the cloud.
#[async_trait::async_trait]
pub trait PushProvider: CloudProvider {
    fn supports_push(&self) -> bool {
        true
    }

    async fn create_pool_in_cloud(
        &self,
        connection: &CloudConnection,
        pool: &Pool,
        parent_external_id: Option<&str>,
    ) -> Result<String, ProviderError>;
    async fn delete_pool_in_cloud(&self, connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError>;

    async fn allocate_block_in_cloud(
        &self,
        connection: &CloudConnection,
        pool_external_id: &str,
        block: &Block,
    ) -> Result<String, ProviderError>;
    async fn delete_block_in_cloud(&self, connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError>;

    async fn create_allocation_in_cloud(
        &self,
        connection: &CloudConnection,
        block_external_id: &str,
        allocation: &Allocation,
    ) -> Result<String, ProviderError>;
    async fn delete_allocation_in_cloud(&self, connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError>;

    /// Whether `external_id` has the shape of a real cloud block resource.
    /// Legacy rows with other ids are purged locally without a cloud call.
    fn is_cloud_block_id(&self, _external_id: &str) -> bool {
        true
    }
}

/// Push operations of `provider`, when it has them and has push enabled
pub fn push_capability(provider: &dyn CloudProvider) -> Option<&dyn PushProvider> {
    provider.as_push().filter(|push| push.supports_push())
}
