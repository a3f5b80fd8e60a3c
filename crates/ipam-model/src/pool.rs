//! Pool
//!
//! Top-level address space owned by an organization and scoped to an environment.

use crate::identity::{impl_cloud_tracked, ProviderIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pool {
    /// Local identifier (nil for entries a provider has not matched yet)
    #[serde(default)]
    pub id: Uuid,

    pub organization_id: Uuid,

    pub environment_id: Uuid,

    pub name: String,

    /// May be empty while the cloud has not provisioned a range yet
    #[serde(default)]
    pub cidr: String,

    /// Parent pool for sub-pool hierarchies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_pool_id: Option<Uuid>,

    /// Parent's cloud id on pulled entries, resolved into `parent_pool_id`
    /// by the sync engine; never stored
    #[serde(skip)]
    pub parent_external_id: Option<String>,

    #[serde(flatten)]
    pub identity: ProviderIdentity,

    /// Set when the pool is pending deletion in the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_cloud_tracked!(Pool);

impl Pool {
    /// A native pool with no local id yet
    pub fn new(
        organization_id: Uuid,
        environment_id: Uuid,
        name: impl Into<String>,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            organization_id,
            environment_id,
            name: name.into(),
            cidr: cidr.into(),
            parent_pool_id: None,
            parent_external_id: None,
            identity: ProviderIdentity::native(),
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_parent(mut self, parent_pool_id: Uuid) -> Self {
        self.parent_pool_id = Some(parent_pool_id);
        self
    }

    pub fn with_parent_external_id(mut self, parent_external_id: Option<String>) -> Self {
        self.parent_external_id = parent_external_id;
        self
    }

    pub fn with_identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = identity;
        self
    }
}
