//! Push operations of the mock provider

use super::{MockCloudProvider, ProviderCall};
use crate::error::ProviderError;
use crate::inventory::{CloudAllocation, CloudBlock, CloudPool};
use crate::provider_trait::PushProvider;
use ipam_model::{Allocation, Block, CloudConnection, Pool};

impl MockCloudProvider {
    fn injected_error(&self, name: &str) -> Result<(), ProviderError> {
        match self.push_errors.lock().unwrap().get(name) {
            Some(message) => Err(ProviderError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PushProvider for MockCloudProvider {
    async fn create_pool_in_cloud(
        &self,
        _connection: &CloudConnection,
        pool: &Pool,
        parent_external_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.record(ProviderCall::CreatePool {
            name: pool.name.clone(),
            parent_external_id: parent_external_id.map(str::to_string),
        });
        self.injected_error(&pool.name)?;
        let external_id = self.next_external_id("ipam-pool");
        self.inventory.lock().unwrap().pools.push(CloudPool {
            external_id: external_id.clone(),
            name: pool.name.clone(),
            cidr: pool.cidr.clone(),
            parent_external_id: parent_external_id.map(str::to_string),
        });
        Ok(external_id)
    }

    async fn delete_pool_in_cloud(&self, _connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::DeletePool(external_id.to_string()));
        let mut inventory = self.inventory.lock().unwrap();
        let before = inventory.pools.len();
        inventory.pools.retain(|p| p.external_id != external_id);
        if inventory.pools.len() == before {
            return Err(ProviderError::NotFound(format!("pool {}", external_id)));
        }
        Ok(())
    }

    async fn allocate_block_in_cloud(
        &self,
        _connection: &CloudConnection,
        pool_external_id: &str,
        block: &Block,
    ) -> Result<String, ProviderError> {
        self.record(ProviderCall::AllocateBlock {
            name: block.name.clone(),
            pool_external_id: pool_external_id.to_string(),
        });
        self.injected_error(&block.name)?;
        let external_id = self.next_external_id("vpc");
        self.inventory.lock().unwrap().blocks.push(CloudBlock {
            external_id: external_id.clone(),
            name: block.name.clone(),
            cidr: block.cidr.clone(),
            pool_external_id: Some(pool_external_id.to_string()),
        });
        Ok(external_id)
    }

    async fn delete_block_in_cloud(&self, _connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::DeleteBlock(external_id.to_string()));
        let mut inventory = self.inventory.lock().unwrap();
        let before = inventory.blocks.len();
        inventory.blocks.retain(|b| b.external_id != external_id);
        if inventory.blocks.len() == before {
            return Err(ProviderError::NotFound(format!("block {}", external_id)));
        }
        Ok(())
    }

    async fn create_allocation_in_cloud(
        &self,
        _connection: &CloudConnection,
        block_external_id: &str,
        allocation: &Allocation,
    ) -> Result<String, ProviderError> {
        self.record(ProviderCall::CreateAllocation {
            name: allocation.name.clone(),
            block_external_id: block_external_id.to_string(),
        });
        self.injected_error(&allocation.name)?;
        let external_id = self.next_external_id("subnet");
        self.inventory.lock().unwrap().allocations.push(CloudAllocation {
            external_id: external_id.clone(),
            name: allocation.name.clone(),
            cidr: allocation.cidr.clone(),
            block_external_id: block_external_id.to_string(),
        });
        Ok(external_id)
    }

    async fn delete_allocation_in_cloud(&self, _connection: &CloudConnection, external_id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::DeleteAllocation(external_id.to_string()));
        let mut inventory = self.inventory.lock().unwrap();
        let before = inventory.allocations.len();
        inventory.allocations.retain(|a| a.external_id != external_id);
        if inventory.allocations.len() == before {
            return Err(ProviderError::NotFound(format!("allocation {}", external_id)));
        }
        Ok(())
    }

    fn is_cloud_block_id(&self, external_id: &str) -> bool {
        external_id.starts_with("vpc-")
    }
}
