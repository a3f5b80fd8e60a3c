//! List filters for blocks and allocations
//!
//! Unset fields match everything.

use ipam_model::{Allocation, Block, CloudTracked};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFilter {
    pub organization_id: Option<Uuid>,
    pub environment_id: Option<Uuid>,
    pub pool_id: Option<Uuid>,
    pub connection_id: Option<Uuid>,
    pub provider: Option<String>,
    /// Only blocks without an owning pool
    pub orphans_only: bool,
}

impl BlockFilter {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Default::default()
        }
    }

    pub fn pool(pool_id: Uuid) -> Self {
        Self {
            pool_id: Some(pool_id),
            ..Default::default()
        }
    }

    pub fn environment(mut self, environment_id: Uuid) -> Self {
        self.environment_id = Some(environment_id);
        self
    }

    pub fn connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn orphans(mut self) -> Self {
        self.orphans_only = true;
        self
    }

    pub fn matches(&self, block: &Block) -> bool {
        self.organization_id.is_none_or(|org| block.organization_id == org)
            && self.environment_id.is_none_or(|env| block.environment_id == Some(env))
            && self.pool_id.is_none_or(|pool| block.pool_id == Some(pool))
            && self.connection_id.is_none_or(|conn| block.identity().is_connection(conn))
            && self.provider.as_deref().is_none_or(|p| block.identity.provider == p)
            && (!self.orphans_only || block.is_orphan())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationFilter {
    pub organization_id: Option<Uuid>,
    pub block_name: Option<String>,
    /// Narrows `block_name`; allocations with an unknown block CIDR still match
    pub block_cidr: Option<String>,
    pub connection_id: Option<Uuid>,
}

impl AllocationFilter {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Default::default()
        }
    }

    /// Allocations of `block`, by name and CIDR
    pub fn block(mut self, block: &Block) -> Self {
        self.block_name = Some(block.name.clone());
        self.block_cidr = Some(block.cidr.clone());
        self
    }

    pub fn connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    pub fn matches(&self, allocation: &Allocation) -> bool {
        self.organization_id.is_none_or(|org| allocation.organization_id == org)
            && self.block_name.as_deref().is_none_or(|name| allocation.block_name == name)
            && self
                .block_cidr
                .as_deref()
                .is_none_or(|cidr| allocation.block_cidr.is_empty() || allocation.block_cidr == cidr)
            && self.connection_id.is_none_or(|conn| allocation.identity().is_connection(conn))
    }
}
