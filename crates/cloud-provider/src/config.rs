//! Provider configuration stored on a connection
//!
//! The connection's `config` JSON is opaque to the engine except for the
//! fields below. Unknown keys are ignored so each provider can add its own.

use crate::error::ProviderError;
use ipam_model::CloudConnection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Cloud IPAM scope the pools live in
    #[serde(default, alias = "ipam_scope_id", skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,

    /// Local environment that cloud pools map to, and that local pools are pushed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,

    /// JSON export read by the inventory provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_pools: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_blocks: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_allocations: Option<bool>,
}

/// Which tiers a sync run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSelection {
    pub pools: bool,
    pub blocks: bool,
    pub allocations: bool,
}

impl Default for TierSelection {
    fn default() -> Self {
        Self {
            pools: true,
            blocks: true,
            allocations: true,
        }
    }
}

impl ProviderConfig {
    /// Parses the connection's config; `null` and `{}` give the defaults
    pub fn from_connection(connection: &CloudConnection) -> Result<Self, ProviderError> {
        if connection.config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(connection.config.clone()).map_err(|e| {
            ProviderError::InvalidConfig(format!("connection {} config: {}", connection.id, e))
        })
    }

    /// Tier flags; each defaults to enabled
    pub fn tiers(&self) -> TierSelection {
        TierSelection {
            pools: self.sync_pools.unwrap_or(true),
            blocks: self.sync_blocks.unwrap_or(true),
            allocations: self.sync_allocations.unwrap_or(true),
        }
    }

    /// Target environment, treating an empty string as unset
    pub fn environment_id(&self) -> Result<Option<Uuid>, ProviderError> {
        match self.environment_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|e| ProviderError::InvalidConfig(format!("environment_id '{}': {}", raw, e))),
        }
    }

    pub fn require_environment(&self) -> Result<Uuid, ProviderError> {
        self.environment_id()?
            .ok_or_else(|| ProviderError::InvalidConfig("environment_id is not set".to_string()))
    }

    pub fn require_region(&self) -> Result<&str, ProviderError> {
        self.region
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ProviderError::InvalidConfig("region is not set".to_string()))
    }

    pub fn require_inventory_path(&self) -> Result<&PathBuf, ProviderError> {
        self.inventory_path
            .as_ref()
            .ok_or_else(|| ProviderError::InvalidConfig("inventory_path is not set".to_string()))
    }
}
