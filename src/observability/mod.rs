//! Observability module for the audit vault.
//!
//! Provides logging initialization and the metric helpers used by the
//! lifecycle components. No exporter is installed here; without a recorder
//! the `metrics` macros are no-ops.

use crate::config::ObservabilityConfig;
use crate::error::{Result, VaultError};
use crate::types::{RecordCategory, RetentionStatus};
use metrics::{counter, gauge};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| VaultError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| VaultError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Record a newly stored archive.
pub fn record_archive_created(category: RecordCategory, payload_bytes: u64, stored_bytes: u64) {
    counter!("auditvault_archives_created_total", "category" => category.as_str()).increment(1);
    counter!("auditvault_payload_bytes_total").increment(payload_bytes);
    counter!("auditvault_stored_bytes_total").increment(stored_bytes);
}

/// Record the outcome of an integrity check.
pub fn record_integrity_check(ok: bool) {
    counter!("auditvault_integrity_checks_total").increment(1);
    if !ok {
        counter!("auditvault_integrity_failures_total").increment(1);
    }
}

/// Record archives moved to EXPIRED.
pub fn record_expired(count: usize) {
    counter!("auditvault_archives_expired_total").increment(count as u64);
}

/// Record a purge.
pub fn record_purge() {
    counter!("auditvault_archives_purged_total").increment(1);
}

/// Record a hold placement or release.
pub fn record_hold(placed: bool, archives: usize) {
    if placed {
        counter!("auditvault_holds_placed_total").increment(1);
        counter!("auditvault_held_archives_total").increment(archives as u64);
    } else {
        counter!("auditvault_holds_released_total").increment(1);
    }
}

/// Record a reconciliation tick.
pub fn record_reconcile_tick(failed_steps: usize) {
    counter!("auditvault_reconcile_ticks_total").increment(1);
    if failed_steps > 0 {
        counter!("auditvault_reconcile_step_failures_total").increment(failed_steps as u64);
    }
}

/// Update per-status archive gauges.
pub fn update_status_gauges(counts: &[(RetentionStatus, u64)]) {
    for (status, count) in counts {
        gauge!("auditvault_archives", "status" => status.as_str()).set(*count as f64);
    }
}
