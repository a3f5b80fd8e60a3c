//! Storer trait
//!
//! Persistence seam consumed by the sync engine. Implementations must be safe
//! to share between the concurrent sync runs of different connections.

use crate::error::StoreError;
use crate::filter::{AllocationFilter, BlockFilter};
use crate::lock::SyncLockGuard;
use ipam_model::{Allocation, Block, CloudConnection, Pool};
use uuid::Uuid;

/// Storage operations used by the sync engine
///
/// "Including deleted" listings return soft-deleted rows as well; they are
/// used for adoption matching so a pending-delete row is never duplicated.
/// "Pending cloud delete" listings return rows linked to the connection that
/// have an external id and are soft-deleted.
#[async_trait::async_trait]
pub trait Storer: Send + Sync {
    /// Generate an identifier for a new row
    fn generate_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    // Connections
    async fn create_connection(&self, connection: &CloudConnection) -> Result<(), StoreError>;
    async fn get_connection(&self, id: Uuid) -> Result<CloudConnection, StoreError>;
    async fn list_connections(&self) -> Result<Vec<CloudConnection>, StoreError>;
    async fn update_connection(&self, connection: &CloudConnection) -> Result<(), StoreError>;

    // Pools
    async fn create_pool(&self, pool: &Pool) -> Result<(), StoreError>;
    async fn get_pool(&self, id: Uuid) -> Result<Pool, StoreError>;
    async fn update_pool(&self, pool: &Pool) -> Result<(), StoreError>;
    async fn delete_pool(&self, id: Uuid) -> Result<(), StoreError>;
    async fn soft_delete_pool(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_pools_by_organization(&self, organization_id: Uuid) -> Result<Vec<Pool>, StoreError>;
    async fn list_pools_by_organization_including_deleted(&self, organization_id: Uuid) -> Result<Vec<Pool>, StoreError>;
    async fn list_pools_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Pool>, StoreError>;

    // Blocks
    async fn create_block(&self, block: &Block) -> Result<(), StoreError>;
    async fn get_block(&self, id: Uuid) -> Result<Block, StoreError>;
    async fn update_block(&self, block: &Block) -> Result<(), StoreError>;
    async fn delete_block(&self, id: Uuid) -> Result<(), StoreError>;
    async fn soft_delete_block(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_blocks(&self, filter: &BlockFilter) -> Result<Vec<Block>, StoreError>;
    async fn list_blocks_including_deleted(&self, filter: &BlockFilter) -> Result<Vec<Block>, StoreError>;
    async fn list_blocks_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Block>, StoreError>;

    // Allocations
    async fn create_allocation(&self, allocation: &Allocation) -> Result<(), StoreError>;
    async fn get_allocation(&self, id: Uuid) -> Result<Allocation, StoreError>;
    async fn update_allocation(&self, allocation: &Allocation) -> Result<(), StoreError>;
    async fn delete_allocation(&self, id: Uuid) -> Result<(), StoreError>;
    async fn soft_delete_allocation(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>, StoreError>;
    async fn list_allocations_including_deleted(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>, StoreError>;
    async fn list_allocations_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Allocation>, StoreError>;

    // Sync lock
    /// Try to take the per-connection sync lock without waiting.
    ///
    /// Returns `None` when another run holds it. The lock is released when the guard drops.
    async fn try_acquire_sync_lock(&self, connection_id: Uuid) -> Result<Option<SyncLockGuard>, StoreError>;
}
