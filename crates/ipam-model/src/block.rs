//! Block
//!
//! A range inside a pool. Blocks without a pool ("orphan" blocks) are scoped
//! to their environment, or only to their organization when no environment is set.

use crate::identity::{impl_cloud_tracked, ProviderIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    #[serde(default)]
    pub id: Uuid,

    pub organization_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<Uuid>,

    /// Owning pool; the block CIDR must be contained in the pool CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<Uuid>,

    pub name: String,

    #[serde(default)]
    pub cidr: String,

    #[serde(flatten)]
    pub identity: ProviderIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_cloud_tracked!(Block);

impl Block {
    /// A native orphan block with no local id yet
    pub fn new(organization_id: Uuid, name: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            organization_id,
            environment_id: None,
            pool_id: None,
            name: name.into(),
            cidr: cidr.into(),
            identity: ProviderIdentity::native(),
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn in_environment(mut self, environment_id: Uuid) -> Self {
        self.environment_id = Some(environment_id);
        self
    }

    pub fn in_pool(mut self, pool_id: Uuid) -> Self {
        self.pool_id = Some(pool_id);
        self
    }

    pub fn with_identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn is_orphan(&self) -> bool {
        self.pool_id.is_none()
    }
}
