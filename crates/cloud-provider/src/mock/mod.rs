//! Mock cloud provider for unit testing
//!
//! Keeps an in-memory `CloudInventory` that pull operations read and push
//! operations write, so several sync runs against one mock converge the
//! same way they would against a real cloud.
//!
//! - `mod.rs` - state, test setup helpers and the pull side
//! - `push.rs` - the push side

mod push;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::inventory::{CloudAllocation, CloudBlock, CloudInventory, CloudPool};
use crate::models::{AllocationSyncResult, BlockSyncResult, PoolSyncResult};
use crate::provider_trait::{CloudProvider, PushProvider};
use ipam_model::{Block, CloudConnection};
use ipam_store::Storer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One observed call on the provider, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    SyncPools,
    SyncBlocks,
    SyncAllocations,
    CreatePool { name: String, parent_external_id: Option<String> },
    DeletePool(String),
    AllocateBlock { name: String, pool_external_id: String },
    DeleteBlock(String),
    CreateAllocation { name: String, block_external_id: String },
    DeleteAllocation(String),
}

/// Mock provider for testing
///
/// Clones share state, so a test can keep a handle after registering the mock.
#[derive(Clone)]
pub struct MockCloudProvider {
    pub(crate) id: String,
    pub(crate) supports: [bool; 3],
    pub(crate) push_enabled: bool,
    pub(crate) inventory: Arc<Mutex<CloudInventory>>,
    pub(crate) calls: Arc<Mutex<Vec<ProviderCall>>>,
    // Resource name -> error message returned by its push
    pub(crate) push_errors: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) pull_error: Arc<Mutex<Option<String>>>,
    pub(crate) withhold_current_ids: Arc<Mutex<bool>>,
    pub(crate) pool_pull_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockCloudProvider {
    /// Create a mock supporting every tier and push
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            supports: [true; 3],
            push_enabled: true,
            inventory: Arc::new(Mutex::new(CloudInventory::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            push_errors: Arc::new(Mutex::new(HashMap::new())),
            pull_error: Arc::new(Mutex::new(None)),
            withhold_current_ids: Arc::new(Mutex::new(false)),
            pool_pull_gate: Arc::new(Mutex::new(None)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Override per-tier capabilities
    pub fn with_capabilities(mut self, pools: bool, blocks: bool, allocations: bool) -> Self {
        self.supports = [pools, blocks, allocations];
        self
    }

    /// Drop the push capability entirely
    pub fn pull_only(mut self) -> Self {
        self.push_enabled = false;
        self
    }

    /// Add a pool to the mock cloud (for test setup)
    pub fn add_pool(&self, external_id: &str, name: &str, cidr: &str) {
        self.inventory.lock().unwrap().pools.push(CloudPool {
            external_id: external_id.to_string(),
            name: name.to_string(),
            cidr: cidr.to_string(),
            parent_external_id: None,
        });
    }

    /// Add a sub-pool of `parent_external_id` to the mock cloud (for test setup)
    pub fn add_sub_pool(&self, external_id: &str, name: &str, cidr: &str, parent_external_id: &str) {
        self.inventory.lock().unwrap().pools.push(CloudPool {
            external_id: external_id.to_string(),
            name: name.to_string(),
            cidr: cidr.to_string(),
            parent_external_id: Some(parent_external_id.to_string()),
        });
    }

    /// Add a block to the mock cloud (for test setup)
    pub fn add_block(&self, external_id: &str, name: &str, cidr: &str, pool_external_id: Option<&str>) {
        self.inventory.lock().unwrap().blocks.push(CloudBlock {
            external_id: external_id.to_string(),
            name: name.to_string(),
            cidr: cidr.to_string(),
            pool_external_id: pool_external_id.map(str::to_string),
        });
    }

    /// Add an allocation to the mock cloud (for test setup)
    pub fn add_allocation(&self, external_id: &str, name: &str, cidr: &str, block_external_id: &str) {
        self.inventory.lock().unwrap().allocations.push(CloudAllocation {
            external_id: external_id.to_string(),
            name: name.to_string(),
            cidr: cidr.to_string(),
            block_external_id: block_external_id.to_string(),
        });
    }

    /// Remove a resource of any tier from the mock cloud, as if deleted out of band
    pub fn remove(&self, external_id: &str) {
        let mut inventory = self.inventory.lock().unwrap();
        inventory.pools.retain(|p| p.external_id != external_id);
        inventory.blocks.retain(|b| b.external_id != external_id);
        inventory.allocations.retain(|a| a.external_id != external_id);
    }

    /// Current mock cloud contents
    pub fn inventory(&self) -> CloudInventory {
        self.inventory.lock().unwrap().clone()
    }

    /// Make the push of the resource named `name` fail with `message`
    pub fn fail_push(&self, name: &str, message: &str) {
        self.push_errors
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    /// Make every pull fail with an API error
    pub fn fail_pulls(&self, message: &str) {
        *self.pull_error.lock().unwrap() = Some(message.to_string());
    }

    /// Report results without `current_external_ids`
    pub fn withhold_current_ids(&self) {
        *self.withhold_current_ids.lock().unwrap() = true;
    }

    /// Block `sync_pools` until `gate` is notified
    pub fn hold_pool_pull(&self, gate: Arc<Notify>) {
        *self.pool_pull_gate.lock().unwrap() = Some(gate);
    }

    /// All calls observed so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn next_external_id(&self, prefix: &str) -> String {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        format!("{}-{}", prefix, current)
    }

    fn check_pull(&self) -> Result<(), ProviderError> {
        match self.pull_error.lock().unwrap().clone() {
            Some(message) => Err(ProviderError::Api(message)),
            None => Ok(()),
        }
    }

    fn finish<T>(&self, mut result: crate::models::SyncResult<T>) -> crate::models::SyncResult<T> {
        if *self.withhold_current_ids.lock().unwrap() {
            result.current_external_ids = None;
        }
        result
    }
}

#[async_trait::async_trait]
impl CloudProvider for MockCloudProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn supports_pools(&self) -> bool {
        self.supports[0]
    }

    fn supports_blocks(&self) -> bool {
        self.supports[1]
    }

    fn supports_allocations(&self) -> bool {
        self.supports[2]
    }

    async fn sync_pools(&self, connection: &CloudConnection) -> Result<PoolSyncResult, ProviderError> {
        self.record(ProviderCall::SyncPools);
        let gate = self.pool_pull_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_pull()?;
        let environment_id = ProviderConfig::from_connection(connection)?.require_environment()?;
        let inventory = self.inventory();
        Ok(self.finish(inventory.pool_result(&self.id, connection, environment_id)))
    }

    async fn sync_blocks(&self, connection: &CloudConnection, store: &dyn Storer) -> Result<BlockSyncResult, ProviderError> {
        self.record(ProviderCall::SyncBlocks);
        self.check_pull()?;
        let environment_id = ProviderConfig::from_connection(connection)?.environment_id()?;
        let inventory = self.inventory();
        let result = inventory.block_result(&self.id, connection, store, environment_id).await?;
        Ok(self.finish(result))
    }

    async fn sync_allocations(
        &self,
        connection: &CloudConnection,
        _store: &dyn Storer,
        blocks: &[Block],
    ) -> Result<AllocationSyncResult, ProviderError> {
        self.record(ProviderCall::SyncAllocations);
        self.check_pull()?;
        let inventory = self.inventory();
        Ok(self.finish(inventory.allocation_result(&self.id, connection, blocks)))
    }

    fn as_push(&self) -> Option<&dyn PushProvider> {
        if self.push_enabled {
            Some(self)
        } else {
            None
        }
    }
}
