//! Provider registry
//!
//! Built once at startup, then shared read-only (usually behind an `Arc`)
//! by every sync run. Registration takes `&mut self`, so lookups after
//! construction need no locking.

use crate::error::RegistryError;
use crate::provider_trait::CloudProvider;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CloudProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider, rejecting empty and duplicate ids
    pub fn try_register(&mut self, provider: Arc<dyn CloudProvider>) -> Result<(), RegistryError> {
        let id = provider.provider_id().to_string();
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.providers.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        info!("Registered cloud provider '{}'", id);
        self.providers.insert(id, provider);
        Ok(())
    }

    /// Adds a provider.
    ///
    /// # Panics
    ///
    /// Panics if the provider id is empty or already registered; both are
    /// startup wiring bugs.
    pub fn register(&mut self, provider: Arc<dyn CloudProvider>) {
        if let Err(e) = self.try_register(provider) {
            panic!("cloud provider registration failed: {}", e);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CloudProvider>> {
        self.providers.get(id).cloned()
    }

    /// Registered ids, sorted
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}
