//! Cloud Sync Controller
//!
//! Keeps IPAM pools, blocks and allocations in sync with cloud providers:
//! - Pull: cloud resources are matched to local rows (by external id, then
//!   by adoption rules) and created, updated or pruned locally
//! - Push: local-only resources are created in the cloud (read-write connections)
//! - Cloud delete: soft-deleted rows are removed from the cloud, then purged
//!   (read-write connections where local state wins)
//!
//! `Reconciler` runs these phases for one connection; `SyncScheduler` runs
//! every due connection in the background.

pub mod config;
pub mod controller;
pub mod error;
pub mod reconcile_helpers;
pub mod reconciler;

#[cfg(test)]
mod test_utils;

pub use config::{LogFormat, SchedulerConfig};
pub use controller::SyncScheduler;
pub use error::SyncError;
pub use reconciler::{ApplyReport, DeleteReport, PushReport, Reconciler, SyncOutcome, SyncReport};
