//! Cloud connection
//!
//! Links one organization to one cloud provider and carries the sync policy
//! (mode, conflict resolution, interval) plus the last-sync status surface.

use crate::error::ModelError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default background sync interval for new connections
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 5;

/// Upper bound for `sync_interval_minutes` (one day)
pub const MAX_SYNC_INTERVAL_MINUTES: u32 = 1440;

/// Direction of synchronization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Pull from the cloud only
    #[default]
    ReadOnly,
    /// Pull from the cloud and push local resources to it
    ReadWrite,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read_only"),
            Self::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// Which side wins when a cloud resource collides with a local row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The cloud is authoritative
    #[default]
    Cloud,
    /// Local state is authoritative
    Ipam,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud => write!(f, "cloud"),
            Self::Ipam => write!(f, "ipam"),
        }
    }
}

/// Outcome of the most recent sync run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Syncing,
    Success,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syncing => write!(f, "syncing"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

fn default_sync_interval() -> u32 {
    DEFAULT_SYNC_INTERVAL_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudConnection {
    pub id: Uuid,

    pub organization_id: Uuid,

    /// Registered provider identifier (e.g. "aws")
    pub provider: String,

    pub name: String,

    /// Provider-specific configuration, opaque to the engine
    #[serde(default)]
    pub config: serde_json::Value,

    /// Background sync interval; 0 disables background sync
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u32,

    #[serde(default)]
    pub sync_mode: SyncMode,

    #[serde(default)]
    pub conflict_resolution: ConflictResolution,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_status: Option<SyncStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CloudConnection {
    /// A connection with default policy: read-only, cloud wins, 5 minute interval
    pub fn new(
        id: Uuid,
        organization_id: Uuid,
        provider: impl Into<String>,
        name: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            organization_id,
            provider: provider.into(),
            name: name.into(),
            config,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            sync_mode: SyncMode::default(),
            conflict_resolution: ConflictResolution::default(),
            last_sync_at: None,
            last_sync_status: None,
            last_sync_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_read_write(&self) -> bool {
        self.sync_mode == SyncMode::ReadWrite
    }

    /// Local state is authoritative and changes flow to the cloud
    pub fn is_ipam_authoritative(&self) -> bool {
        self.is_read_write() && self.conflict_resolution == ConflictResolution::Ipam
    }

    /// Whether the background scheduler should run this connection at `now`
    pub fn is_sync_due(&self, now: DateTime<Utc>) -> bool {
        if self.sync_interval_minutes == 0 {
            return false;
        }
        match self.last_sync_at {
            None => true,
            Some(last) => now - last >= Duration::minutes(i64::from(self.sync_interval_minutes)),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.provider.trim().is_empty() {
            return Err(ModelError::InvalidConnection(format!(
                "connection {} has no provider",
                self.id
            )));
        }
        if self.sync_interval_minutes > MAX_SYNC_INTERVAL_MINUTES {
            return Err(ModelError::InvalidConnection(format!(
                "sync_interval_minutes must be between 0 and {}, got {}",
                MAX_SYNC_INTERVAL_MINUTES, self.sync_interval_minutes
            )));
        }
        Ok(())
    }

    pub fn mark_syncing(&mut self, now: DateTime<Utc>) {
        self.last_sync_at = Some(now);
        self.last_sync_status = Some(SyncStatus::Syncing);
        self.last_sync_error = None;
        self.updated_at = now;
    }

    pub fn mark_success(&mut self) {
        self.last_sync_status = Some(SyncStatus::Success);
        self.last_sync_error = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.last_sync_status = Some(SyncStatus::Failed);
        self.last_sync_error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> CloudConnection {
        CloudConnection::new(Uuid::new_v4(), Uuid::new_v4(), "aws", "prod", serde_json::json!({}))
    }

    #[test]
    fn test_never_synced_is_due() {
        let conn = connection();
        assert!(conn.is_sync_due(Utc::now()));
    }

    #[test]
    fn test_zero_interval_is_never_due() {
        let mut conn = connection();
        conn.sync_interval_minutes = 0;
        assert!(!conn.is_sync_due(Utc::now()));
    }

    #[test]
    fn test_due_after_interval_elapsed() {
        let now = Utc::now();
        let mut conn = connection();
        conn.last_sync_at = Some(now - Duration::minutes(4));
        assert!(!conn.is_sync_due(now));
        conn.last_sync_at = Some(now - Duration::minutes(5));
        assert!(conn.is_sync_due(now));
    }

    #[test]
    fn test_defaults_from_json() {
        let conn: CloudConnection = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "organization_id": Uuid::new_v4(),
            "provider": "aws",
            "name": "prod",
        }))
        .unwrap();
        assert_eq!(conn.sync_interval_minutes, DEFAULT_SYNC_INTERVAL_MINUTES);
        assert_eq!(conn.sync_mode, SyncMode::ReadOnly);
        assert_eq!(conn.conflict_resolution, ConflictResolution::Cloud);
    }

    #[test]
    fn test_validate_interval_bounds() {
        let mut conn = connection();
        conn.sync_interval_minutes = MAX_SYNC_INTERVAL_MINUTES;
        assert!(conn.validate().is_ok());
        conn.sync_interval_minutes = MAX_SYNC_INTERVAL_MINUTES + 1;
        assert!(matches!(conn.validate(), Err(ModelError::InvalidConnection(_))));
    }

    #[test]
    fn test_status_transitions() {
        let mut conn = connection();
        conn.mark_failed("boom");
        conn.mark_syncing(Utc::now());
        assert_eq!(conn.last_sync_status, Some(SyncStatus::Syncing));
        assert_eq!(conn.last_sync_error, None);
        conn.mark_success();
        assert_eq!(conn.last_sync_status, Some(SyncStatus::Success));
    }

    #[test]
    fn test_ipam_authoritative_requires_read_write() {
        let mut conn = connection();
        conn.conflict_resolution = ConflictResolution::Ipam;
        assert!(!conn.is_ipam_authoritative());
        conn.sync_mode = SyncMode::ReadWrite;
        assert!(conn.is_ipam_authoritative());
    }
}
