//! Provider identity and soft-delete lifecycle shared by pools, blocks and allocations
//!
//! A row is either *native* (created locally, no external id) or linked to a
//! cloud resource through `ProviderIdentity`. Soft-deleting a linked row moves
//! it to `PendingCloudDelete`; the cloud-delete pass is the only step that
//! removes it for good.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider name used for rows that were created locally
pub const NATIVE_PROVIDER: &str = "native";

fn native_provider() -> String {
    NATIVE_PROVIDER.to_string()
}

/// Which cloud resource (if any) a local row mirrors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Provider identifier (`native` for locally created rows)
    #[serde(default = "native_provider")]
    pub provider: String,

    /// Identifier of the resource in the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Connection this row was last synced from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<Uuid>,

    /// Cloud name last seen for the resource, kept only while the local
    /// name differs from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self::native()
    }
}

impl ProviderIdentity {
    /// Identity of a locally created row
    pub fn native() -> Self {
        Self {
            provider: native_provider(),
            external_id: None,
            connection_id: None,
            external_name: None,
        }
    }

    /// Identity of a row mirroring `external_id` through `connection_id`
    pub fn linked(provider: impl Into<String>, external_id: impl Into<String>, connection_id: Uuid) -> Self {
        Self {
            provider: provider.into(),
            external_id: Some(external_id.into()),
            connection_id: Some(connection_id),
            external_name: None,
        }
    }

    /// External id, treating an empty string as absent
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn has_external_id(&self) -> bool {
        self.external_id().is_some()
    }

    pub fn is_connection(&self, connection_id: Uuid) -> bool {
        self.connection_id == Some(connection_id)
    }

    /// Drops the cloud id but keeps the connection link, so the push pass
    /// recreates the resource under the same connection.
    pub fn clear_external_id(&mut self) {
        self.external_id = None;
        self.external_name = None;
    }

    /// Stamps the identity returned by a successful cloud create
    pub fn stamp(&mut self, provider: &str, external_id: String, connection_id: Uuid) {
        self.provider = provider.to_string();
        self.external_id = Some(external_id);
        self.connection_id = Some(connection_id);
        self.external_name = None;
    }
}

/// Lifecycle of a stored row with respect to its cloud counterpart.
/// Purging removes the row, so there is no state for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    PendingCloudDelete,
}

/// Common view over pools, blocks and allocations
pub trait CloudTracked {
    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
    fn identity(&self) -> &ProviderIdentity;
    fn identity_mut(&mut self) -> &mut ProviderIdentity;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn external_id(&self) -> Option<&str> {
        self.identity().external_id()
    }

    fn lifecycle(&self) -> LifecycleState {
        if self.deleted_at().is_some() {
            LifecycleState::PendingCloudDelete
        } else {
            LifecycleState::Active
        }
    }

    /// Linked to `connection_id` with a cloud id
    fn is_linked_to(&self, connection_id: Uuid) -> bool {
        self.identity().is_connection(connection_id) && self.identity().has_external_id()
    }

    /// No cloud id and not soft-deleted: eligible for adoption
    fn is_adoptable(&self) -> bool {
        !self.identity().has_external_id() && self.deleted_at().is_none()
    }

    /// Soft-deleted locally but still present in the cloud under `connection_id`
    fn is_pending_cloud_delete(&self, connection_id: Uuid) -> bool {
        self.lifecycle() == LifecycleState::PendingCloudDelete && self.is_linked_to(connection_id)
    }
}

macro_rules! impl_cloud_tracked {
    ($ty:ty) => {
        impl $crate::identity::CloudTracked for $ty {
            fn id(&self) -> uuid::Uuid {
                self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn identity(&self) -> &$crate::identity::ProviderIdentity {
                &self.identity
            }
            fn identity_mut(&mut self) -> &mut $crate::identity::ProviderIdentity {
                &mut self.identity
            }
            fn deleted_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.deleted_at
            }
        }
    };
}

pub(crate) use impl_cloud_tracked;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pool;

    #[test]
    fn test_empty_external_id_is_absent() {
        let mut identity = ProviderIdentity::native();
        identity.external_id = Some(String::new());
        assert!(!identity.has_external_id());
        assert_eq!(identity.external_id(), None);
    }

    #[test]
    fn test_lifecycle_follows_deleted_at() {
        let connection_id = Uuid::new_v4();
        let mut pool = Pool::new(Uuid::new_v4(), Uuid::new_v4(), "prod", "10.0.0.0/16")
            .with_identity(ProviderIdentity::linked("aws", "ipam-pool-1", connection_id));
        assert_eq!(pool.lifecycle(), LifecycleState::Active);
        assert!(!pool.is_pending_cloud_delete(connection_id));

        pool.deleted_at = Some(Utc::now());
        assert_eq!(pool.lifecycle(), LifecycleState::PendingCloudDelete);
        assert!(pool.is_pending_cloud_delete(connection_id));
        assert!(!pool.is_pending_cloud_delete(Uuid::new_v4()));
    }

    #[test]
    fn test_clear_external_id_keeps_connection() {
        let connection_id = Uuid::new_v4();
        let mut identity = ProviderIdentity::linked("aws", "vpc-1", connection_id);
        identity.clear_external_id();
        assert!(!identity.has_external_id());
        assert!(identity.is_connection(connection_id));
        assert_eq!(identity.provider, "aws");
    }
}
