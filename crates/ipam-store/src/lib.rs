//! IPAM Store
//!
//! Storage seam for the cloud sync engine. The engine only talks to the
//! `Storer` trait; `MemoryStore` is the in-process implementation used by the
//! controller binary and by tests.
//!
//! # Example
//!
//! ```no_run
//! use ipam_store::{with_sync_lock, MemoryStore, StoreError, Storer};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = MemoryStore::new();
//! let connection_id = Uuid::new_v4();
//!
//! let ran = with_sync_lock(&store, connection_id, || async {
//!     // one sync run for this connection
//!     Ok::<_, StoreError>(())
//! })
//! .await?;
//! assert!(ran.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod lock;
pub mod memory;
#[path = "trait.rs"]
pub mod store_trait;

pub use error::StoreError;
pub use filter::{AllocationFilter, BlockFilter};
pub use lock::{with_sync_lock, SyncLockGuard};
pub use memory::{MemoryStore, Seed};
pub use store_trait::Storer;
