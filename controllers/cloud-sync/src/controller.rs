//! Background sync scheduler.
//!
//! On every tick the scheduler lists all connections and starts a run for
//! each one that is due (`sync_interval_minutes` elapsed since its last run,
//! or never synced). Runs are independent tasks; each takes the
//! connection's sync lock, so a connection still busy from an earlier tick
//! or a manual trigger is skipped. Run errors are logged and never stop the
//! scheduler.

use crate::config::SchedulerConfig;
use crate::error::SyncError;
use crate::reconciler::{Reconciler, SyncOutcome};
use chrono::{DateTime, Utc};
use ipam_model::CloudConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Periodically runs due connections.
pub struct SyncScheduler {
    reconciler: Reconciler,
    config: SchedulerConfig,
    shutdown: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
}

impl SyncScheduler {
    /// Creates a new scheduler instance.
    pub fn new(reconciler: Reconciler, config: SchedulerConfig) -> Self {
        Self {
            reconciler,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_signal: Arc::new(Notify::new()),
        }
    }

    /// Runs until `shutdown` is called, then waits for in-flight runs.
    ///
    /// The first scan happens immediately.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), SyncError> {
        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            run_timeout_secs = self.config.run_timeout.as_secs(),
            "Starting sync scheduler"
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    in_flight.retain(|handle| !handle.is_finished());
                    match self.tick(Utc::now()).await {
                        Ok(handles) => in_flight.extend(handles),
                        Err(e) => error!("Failed to scan connections: {}", e),
                    }
                }
                _ = self.shutdown_signal.notified() => {
                    info!("Scheduler shutdown requested, stopping tick loop");
                    break;
                }
            }
        }

        info!(in_flight = in_flight.len(), "Waiting for in-flight syncs to complete...");
        futures::future::join_all(in_flight).await;
        info!("Sync scheduler stopped");
        Ok(())
    }

    /// One scan: starts a locked, time-bounded run per due connection and
    /// returns the handles of the started runs.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>, SyncError> {
        let due = self.due_connections(now).await?;
        if due.is_empty() {
            debug!("No connections due for sync");
            return Ok(Vec::new());
        }

        info!("Starting sync for {} due connections", due.len());
        let handles = due
            .into_iter()
            .map(|connection| {
                let reconciler = self.reconciler.clone();
                let timeout = self.config.run_timeout;
                tokio::spawn(async move {
                    let connection_id = connection.id;
                    match reconciler.run_locked_sync(connection_id, timeout).await {
                        Ok(SyncOutcome::Completed(report)) => info!(
                            %connection_id,
                            applied = report.applied_changes(),
                            pushed = report.pushed(),
                            "Background sync completed"
                        ),
                        Ok(SyncOutcome::Skipped) => {
                            debug!(%connection_id, "Background sync skipped, connection is already syncing")
                        }
                        Err(e) => warn!(%connection_id, error = %e, "Background sync failed"),
                    }
                })
            })
            .collect();
        Ok(handles)
    }

    /// Connections whose interval has elapsed at `now`
    pub async fn due_connections(&self, now: DateTime<Utc>) -> Result<Vec<CloudConnection>, SyncError> {
        let connections = self.reconciler.store().list_connections().await?;
        Ok(connections.into_iter().filter(|c| c.is_sync_due(now)).collect())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_signal.notify_one();
    }

    /// Check if shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
