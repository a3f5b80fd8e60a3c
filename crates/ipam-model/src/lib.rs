//! IPAM Model
//!
//! Shared types for hierarchical IP address management and cloud sync:
//! - `Pool`: top-level address space, optionally nested under a parent pool
//! - `Block`: a range carved out of a pool (or an "orphan" block with no pool yet)
//! - `Allocation`: a range inside a block, referenced by block name
//! - `CloudConnection`: an organization's link to one cloud provider
//!
//! Every tier carries a `ProviderIdentity` recording which cloud resource it
//! mirrors, and a soft-delete timestamp that drives the cloud-delete lifecycle.

pub mod allocation;
pub mod block;
pub mod cidr;
pub mod connection;
pub mod error;
pub mod identity;
pub mod pool;

pub use allocation::*;
pub use block::*;
pub use connection::*;
pub use error::ModelError;
pub use identity::*;
pub use pool::*;
