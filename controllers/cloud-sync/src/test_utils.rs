//! Test utilities for unit testing the reconciler
//!
//! `TestEnv` wires a `MemoryStore`, a `MockCloudProvider` registered as
//! `aws`, and one connection whose config targets a fresh environment.

#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use cloud_provider::{MockCloudProvider, ProviderRegistry};
#[cfg(test)]
use ipam_model::{Allocation, Block, CloudConnection, ConflictResolution, Pool, ProviderIdentity, SyncMode};
#[cfg(test)]
use ipam_store::{AllocationFilter, BlockFilter, MemoryStore, Storer};
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use uuid::Uuid;

#[cfg(test)]
pub const TEST_PROVIDER: &str = "aws";

#[cfg(test)]
pub struct TestEnv {
    pub store: MemoryStore,
    pub provider: MockCloudProvider,
    pub reconciler: Reconciler,
    pub connection: CloudConnection,
    pub organization_id: Uuid,
    pub environment_id: Uuid,
}

/// Helper to build a connection targeting `environment_id`
#[cfg(test)]
pub fn create_test_connection(
    organization_id: Uuid,
    environment_id: Uuid,
    sync_mode: SyncMode,
    conflict_resolution: ConflictResolution,
) -> CloudConnection {
    let mut connection = CloudConnection::new(
        Uuid::new_v4(),
        organization_id,
        TEST_PROVIDER,
        "test-connection",
        serde_json::json!({ "environment_id": environment_id.to_string() }),
    );
    connection.sync_mode = sync_mode;
    connection.conflict_resolution = conflict_resolution;
    connection
}

/// Helper to set up a store, mock provider and reconciler around one connection
#[cfg(test)]
pub async fn setup(sync_mode: SyncMode, conflict_resolution: ConflictResolution) -> TestEnv {
    setup_with_provider(MockCloudProvider::new(TEST_PROVIDER), sync_mode, conflict_resolution).await
}

#[cfg(test)]
pub async fn setup_with_provider(
    provider: MockCloudProvider,
    sync_mode: SyncMode,
    conflict_resolution: ConflictResolution,
) -> TestEnv {
    let organization_id = Uuid::new_v4();
    let environment_id = Uuid::new_v4();
    let connection = create_test_connection(organization_id, environment_id, sync_mode, conflict_resolution);

    let store = MemoryStore::new();
    store.create_connection(&connection).await.unwrap();

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(provider.clone()));
    let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(registry));

    TestEnv {
        store,
        provider,
        reconciler,
        connection,
        organization_id,
        environment_id,
    }
}

#[cfg(test)]
impl TestEnv {
    fn linked(&self, external_id: &str) -> ProviderIdentity {
        ProviderIdentity::linked(TEST_PROVIDER, external_id, self.connection.id)
    }

    /// Native pool in the connection's environment
    pub async fn add_local_pool(&self, name: &str, cidr: &str) -> Pool {
        let pool = Pool::new(self.organization_id, self.environment_id, name, cidr).with_id(Uuid::new_v4());
        self.store.create_pool(&pool).await.unwrap();
        pool
    }

    /// Pool linked to the connection under `external_id`
    pub async fn add_linked_pool(&self, name: &str, cidr: &str, external_id: &str) -> Pool {
        let pool = Pool::new(self.organization_id, self.environment_id, name, cidr)
            .with_id(Uuid::new_v4())
            .with_identity(self.linked(external_id));
        self.store.create_pool(&pool).await.unwrap();
        pool
    }

    /// Native block, in `pool` when given and otherwise an orphan in the environment
    pub async fn add_local_block(&self, name: &str, cidr: &str, pool: Option<&Pool>) -> Block {
        let mut block = Block::new(self.organization_id, name, cidr)
            .with_id(Uuid::new_v4())
            .in_environment(self.environment_id);
        if let Some(pool) = pool {
            block = block.in_pool(pool.id);
        }
        self.store.create_block(&block).await.unwrap();
        block
    }

    pub async fn add_linked_block(&self, name: &str, cidr: &str, pool: &Pool, external_id: &str) -> Block {
        let block = Block::new(self.organization_id, name, cidr)
            .with_id(Uuid::new_v4())
            .in_environment(self.environment_id)
            .in_pool(pool.id)
            .with_identity(self.linked(external_id));
        self.store.create_block(&block).await.unwrap();
        block
    }

    /// CIDR of the first stored block named `block_name`, empty when there is none
    async fn block_cidr_of(&self, block_name: &str) -> String {
        self.blocks()
            .await
            .into_iter()
            .find(|b| b.name == block_name)
            .map(|b| b.cidr)
            .unwrap_or_default()
    }

    pub async fn add_local_allocation(&self, name: &str, block_name: &str, cidr: &str) -> Allocation {
        let allocation = Allocation::new(self.organization_id, name, block_name, cidr)
            .with_id(Uuid::new_v4())
            .with_block_cidr(self.block_cidr_of(block_name).await);
        self.store.create_allocation(&allocation).await.unwrap();
        allocation
    }

    pub async fn add_linked_allocation(&self, name: &str, block_name: &str, cidr: &str, external_id: &str) -> Allocation {
        let allocation = Allocation::new(self.organization_id, name, block_name, cidr)
            .with_id(Uuid::new_v4())
            .with_block_cidr(self.block_cidr_of(block_name).await)
            .with_identity(self.linked(external_id));
        self.store.create_allocation(&allocation).await.unwrap();
        allocation
    }

    /// Allocation linked to the connection under `block`, for blocks sharing a name
    pub async fn add_linked_allocation_in(&self, name: &str, block: &Block, cidr: &str, external_id: &str) -> Allocation {
        let allocation = Allocation::new(self.organization_id, name, block.name.clone(), cidr)
            .with_id(Uuid::new_v4())
            .with_block_cidr(block.cidr.clone())
            .with_identity(self.linked(external_id));
        self.store.create_allocation(&allocation).await.unwrap();
        allocation
    }

    /// Every pool of the organization, soft-deleted included
    pub async fn pools(&self) -> Vec<Pool> {
        self.store
            .list_pools_by_organization_including_deleted(self.organization_id)
            .await
            .unwrap()
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.store
            .list_blocks_including_deleted(&BlockFilter::organization(self.organization_id))
            .await
            .unwrap()
    }

    pub async fn allocations(&self) -> Vec<Allocation> {
        self.store
            .list_allocations_including_deleted(&AllocationFilter::organization(self.organization_id))
            .await
            .unwrap()
    }

    /// Connection as currently stored
    pub async fn stored_connection(&self) -> CloudConnection {
        self.store.get_connection(self.connection.id).await.unwrap()
    }
}
