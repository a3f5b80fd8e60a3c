//! Allocation
//!
//! A range inside a block. Allocations point at their block by name and CIDR
//! rather than by id, so the link survives a block being re-created from the
//! cloud. Block names alone are not unique.

use crate::identity::{impl_cloud_tracked, ProviderIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    #[serde(default)]
    pub id: Uuid,

    pub organization_id: Uuid,

    pub name: String,

    /// Name of the owning block
    pub block_name: String,

    /// CIDR of the owning block; empty when unknown
    #[serde(default)]
    pub block_cidr: String,

    #[serde(default)]
    pub cidr: String,

    #[serde(flatten)]
    pub identity: ProviderIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_cloud_tracked!(Allocation);

impl Allocation {
    /// A native allocation with no local id yet
    pub fn new(
        organization_id: Uuid,
        name: impl Into<String>,
        block_name: impl Into<String>,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            organization_id,
            name: name.into(),
            block_name: block_name.into(),
            block_cidr: String::new(),
            cidr: cidr.into(),
            identity: ProviderIdentity::native(),
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_block_cidr(mut self, block_cidr: impl Into<String>) -> Self {
        self.block_cidr = block_cidr.into();
        self
    }

    pub fn with_identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = identity;
        self
    }
}
