//! Background reconciliation of archive state.
//!
//! Each tick, in order:
//!
//! 1. expires ACTIVE archives that are past their expiration date
//! 2. re-verifies a random sample of ACTIVE archives, drawn by the catalog
//! 3. prunes the operational log
//!
//! A failing step is logged, published as
//! [`RetentionEvent::ReconcileStepFailed`] and skipped; the remaining steps
//! still run. Transient failures are retried a bounded number of times, which
//! caller-facing operations never do. Each tick runs in its own task so a
//! panic ends only that tick.

use crate::catalog::Catalog;
use crate::clock::SharedClock;
use crate::config::ReconcileConfig;
use crate::error::{Result, VaultError};
use crate::events::{EventBus, RetentionEvent};
use crate::observability;
use crate::retention::{ArchiveManager, OperationKind, OperationRecord, SYSTEM_ACTOR};
use crate::shutdown::ShutdownCoordinator;
use crate::types::{ArchiveId, RetentionStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub ran_at: DateTime<Utc>,
    /// Archives moved to EXPIRED by this tick.
    pub expired: Vec<ArchiveId>,
    /// Sampled archives whose digest matched.
    pub verified: Vec<ArchiveId>,
    /// Sampled archives whose digest did not match.
    pub violations: Vec<ArchiveId>,
    pub pruned_operations: usize,
    /// Steps that failed after retries, as `step: error`.
    pub failed_steps: Vec<String>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            ran_at,
            expired: Vec::new(),
            verified: Vec::new(),
            violations: Vec::new(),
            pruned_operations: 0,
            failed_steps: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.failed_steps.is_empty()
    }
}

/// Runs `op`, retrying transient failures up to `max_retries` extra times.
pub(crate) async fn retry_transient<T, F, Fut>(
    step: &str,
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(step, attempt, error = %e, "Transient failure, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// The periodic background worker.
#[derive(Debug, Clone)]
pub struct Reconciler {
    archives: ArchiveManager,
    catalog: Arc<Catalog>,
    events: Arc<EventBus>,
    clock: SharedClock,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        archives: ArchiveManager,
        catalog: Arc<Catalog>,
        events: Arc<EventBus>,
        clock: SharedClock,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            archives,
            catalog,
            events,
            clock,
            config,
        }
    }

    /// Runs a single tick. Never fails; problems are in the report.
    pub async fn run_once(&self) -> ReconcileReport {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = ReconcileReport::new(now);

        match self
            .retrying("expire", || self.archives.expire_due_archives(now))
            .await
        {
            Ok(expired) => report.expired = expired,
            Err(e) => self.step_failed(&mut report, "expire", &e),
        }

        match self.retrying("sample", || self.sample_active()).await {
            Ok(sample) => {
                for archive_id in sample {
                    let outcome = self
                        .retrying("verify", || self.archives.verify_archive_integrity(&archive_id))
                        .await;
                    match outcome {
                        Ok(true) => report.verified.push(archive_id),
                        Ok(false) => report.violations.push(archive_id),
                        // Held or purged since it was sampled.
                        Err(VaultError::InvalidState(_)) => {
                            debug!(archive_id = %archive_id, "Sampled archive no longer verifiable");
                        }
                        Err(e) => {
                            self.step_failed(&mut report, &format!("verify {}", archive_id), &e)
                        }
                    }
                }
            }
            Err(e) => self.step_failed(&mut report, "sample", &e),
        }

        let cutoff = now - ChronoDuration::days(i64::from(self.config.oplog_retention_days));
        match self.retrying("prune", || self.prune_operations(cutoff)).await {
            Ok(pruned) => report.pruned_operations = pruned,
            Err(e) => self.step_failed(&mut report, "prune", &e),
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        self.record_tick(&report).await;

        observability::record_reconcile_tick(report.failed_steps.len());
        info!(
            expired = report.expired.len(),
            verified = report.verified.len(),
            violations = report.violations.len(),
            pruned = report.pruned_operations,
            failed_steps = report.failed_steps.len(),
            duration_ms = report.duration_ms,
            "Reconcile tick completed"
        );
        self.events.publish(RetentionEvent::ReconcileCompleted {
            report: report.clone(),
        });

        report
    }

    async fn retrying<T, F, Fut>(&self, step: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_transient(step, self.config.max_retries, self.config.retry_backoff, op).await
    }

    async fn sample_active(&self) -> Result<Vec<ArchiveId>> {
        let catalog = self.catalog.clone();
        let sample_size = self.config.sample_size;
        tokio::task::spawn_blocking(move || {
            catalog.read(|tx| tx.sample_ids_with_status(RetentionStatus::Active, sample_size))
        })
        .await?
    }

    async fn prune_operations(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.write(|tx| tx.prune_operations(cutoff)))
            .await?
    }

    fn step_failed(&self, report: &mut ReconcileReport, step: &str, e: &VaultError) {
        warn!(step, error = %e, "Reconcile step failed");
        report.failed_steps.push(format!("{}: {}", step, e));
        self.events.publish(RetentionEvent::ReconcileStepFailed {
            step: step.to_string(),
            error: e.to_string(),
        });
    }

    async fn record_tick(&self, report: &ReconcileReport) {
        let detail = format!(
            "expired {}, verified {}, violations {}, pruned {}",
            report.expired.len(),
            report.verified.len(),
            report.violations.len(),
            report.pruned_operations
        );
        let mut record = OperationRecord::new(OperationKind::ReconcileTick, SYSTEM_ACTOR, report.ran_at);
        record = if report.failed_steps.is_empty() {
            record.with_detail(detail)
        } else {
            record.failed(format!("{}; failed: {}", detail, report.failed_steps.join("; ")))
        };

        let catalog = self.catalog.clone();
        let result = tokio::task::spawn_blocking(move || {
            catalog.write(|tx| tx.append_operation(&record))
        })
        .await;
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "Failed to log reconcile tick"),
            Err(e) => error!(error = %e, "Failed to log reconcile tick"),
        }
    }

    /// Starts the loop on the current runtime.
    ///
    /// The first tick runs immediately.
    pub fn spawn(self, shutdown: &ShutdownCoordinator) -> ReconcilerHandle {
        let coordinator = shutdown.clone();
        let timeout = self.config.shutdown_timeout;
        let join = tokio::spawn(self.run_loop(coordinator.clone()));
        ReconcilerHandle {
            coordinator,
            join,
            timeout,
        }
    }

    async fn run_loop(self, shutdown: ShutdownCoordinator) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.config.interval,
            sample_size = self.config.sample_size,
            "Reconciliation loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                _ = interval.tick() => {}
            }

            // Outside the select so shutdown lets an in-flight tick finish.
            let this = self.clone();
            if let Err(e) = tokio::spawn(async move { this.run_once().await }).await {
                error!(error = %e, "Reconcile tick aborted");
                observability::record_reconcile_tick(1);
                self.events.publish(RetentionEvent::ReconcileStepFailed {
                    step: "tick".to_string(),
                    error: e.to_string(),
                });
            }
        }

        info!("Reconciliation loop stopped");
    }
}

/// Handle to a running reconciliation loop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    coordinator: ShutdownCoordinator,
    join: JoinHandle<()>,
    timeout: Duration,
}

impl ReconcilerHandle {
    /// Signals shutdown and waits for the loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.coordinator.shutdown();
        self.join().await
    }

    /// Waits, bounded by the configured timeout, for the loop to exit after
    /// shutdown was signalled elsewhere.
    pub async fn join(self) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.join).await {
            Ok(joined) => joined.map_err(VaultError::from),
            Err(_) => {
                error!(timeout = ?self.timeout, "Reconciliation loop did not stop in time");
                Err(VaultError::Internal(format!(
                    "reconciliation loop did not stop within {:?}",
                    self.timeout
                )))
            }
        }
    }
}
