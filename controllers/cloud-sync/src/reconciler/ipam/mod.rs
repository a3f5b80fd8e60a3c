//! Diff applier, one module per tier
//!
//! Each tier follows the same steps: index local rows by external id,
//! collect unlinked rows as adoption candidates, apply `create` entries
//! (skip / update / adopt / create), apply `update` entries, then prune rows
//! that disappeared from the cloud when the provider reported the full set.
//!
//! Tiers must run pools, then blocks, then allocations: blocks resolve pool
//! ids and allocations resolve block names from the rows written before them.

pub mod allocation;
pub mod block;
pub mod pool;
#[cfg(test)]
mod block_test;
