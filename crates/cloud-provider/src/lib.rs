//! Cloud Provider Contract
//!
//! The single seam between the sync engine and a cloud address-management
//! system. A provider implements `CloudProvider` (pull) and optionally
//! `PushProvider` (create/delete in the cloud); the engine looks providers up
//! through an injected `ProviderRegistry`.
//!
//! # Example
//!
//! ```no_run
//! use cloud_provider::{InventoryProvider, ProviderRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(Arc::new(InventoryProvider::new()));
//! assert_eq!(registry.list(), vec!["inventory".to_string()]);
//! ```
//!
//! # Features
//!
//! - **Capabilities**: per-tier `supports_*` queries and `as_push` narrowing
//! - **Inventory provider**: pull-only provider reading a JSON cloud export
//! - **Mock provider** (`test-util`): in-memory cloud that records every call

pub mod config;
pub mod error;
pub mod inventory;
pub mod models;
pub mod naming;
pub mod registry;
#[path = "trait.rs"]
pub mod provider_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use config::{ProviderConfig, TierSelection};
pub use error::{ProviderError, RegistryError};
pub use inventory::{CloudAllocation, CloudBlock, CloudInventory, CloudPool, InventoryProvider};
pub use models::*;
pub use provider_trait::{push_capability, CloudProvider, PushProvider};
pub use registry::ProviderRegistry;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCloudProvider, ProviderCall};
