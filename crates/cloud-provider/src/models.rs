//! Pull results returned by providers

use ipam_model::{Allocation, Block, Pool};

/// What a provider observed for one tier on one connection
///
/// `create` entries carry no local id; the engine matches or creates them.
/// `update` entries already carry the local id they replace.
/// `current_external_ids` is the complete set of cloud ids seen for the
/// connection; `None` means the provider could not enumerate the tier and
/// pruning must not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult<T> {
    pub create: Vec<T>,
    pub update: Vec<T>,
    pub current_external_ids: Option<Vec<String>>,
}

pub type PoolSyncResult = SyncResult<Pool>;
pub type BlockSyncResult = SyncResult<Block>;
pub type AllocationSyncResult = SyncResult<Allocation>;

impl<T> Default for SyncResult<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            current_external_ids: None,
        }
    }
}

impl<T> SyncResult<T> {
    /// A result with `create` entries and the full observed id set
    pub fn observed(create: Vec<T>, current_external_ids: Vec<String>) -> Self {
        Self {
            create,
            update: Vec::new(),
            current_external_ids: Some(current_external_ids),
        }
    }
}
