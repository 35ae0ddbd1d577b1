//! AuditVault - tamper-evident retention for audit records.
//!
//! AuditVault archives batches of audit records so that they stay
//! confidential, tampering is detectable, and they are kept for as long as
//! the law requires and no longer than policy allows.
//!
//! # Features
//!
//! - **Encrypted archives**: gzip, then AES-256-GCM with a per-archive key
//!   held in a separate key vault.
//! - **Integrity digests**: keyed HMAC-SHA256 over the ciphertext, bound to
//!   the archive id and category.
//! - **Retention policies**: per-category retention with a 7-year floor.
//! - **Legal holds**: suspend expiration until released, with catch-up on
//!   release.
//! - **Reconciliation**: periodic expiration, sampled re-verification and
//!   operational log pruning.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AuditVault                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Callers: producers | legal matter mgmt | dashboard | CLI   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ArchiveManager | LegalHoldManager | Reconciler             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PolicyRegistry | EventBus | Operational log                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SQLite catalog | EncryptedBlobStore | FileKeyVault         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use auditvault::config::VaultConfig;
//!
//! #[tokio::main]
//! async fn main() -> auditvault::Result<()> {
//!     // Use development configuration
//!     let config = VaultConfig::development();
//!
//!     // Run the reconciliation service until SIGINT/SIGTERM
//!     auditvault::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod blob_store;
pub mod catalog;
pub mod clock;
pub mod compression;
pub mod encryption;
pub mod events;
pub mod keys;
pub mod reconcile;
pub mod retention;
pub mod shutdown;
pub mod system;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{Result, VaultError};
pub use system::RetentionSystem;
pub use types::*;

use config::VaultConfig;
use shutdown::{ShutdownCoordinator, SignalHandler};
use tracing::{info, warn};

/// Run the retention service with the given configuration.
///
/// Hosts the reconciliation loop until SIGINT or SIGTERM, then lets an
/// in-flight tick finish before returning.
pub async fn run(config: VaultConfig) -> Result<()> {
    observability::init(&config.observability)?;
    serve(config).await
}

/// [`run`] without installing the logging subscriber.
pub async fn serve(config: VaultConfig) -> Result<()> {
    let system = RetentionSystem::open(config)?;
    let reconcile = system.config().reconciliation.clone();
    let coordinator = ShutdownCoordinator::new();

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    let handle = if reconcile.enabled {
        Some(system.reconciler().spawn(&coordinator))
    } else {
        warn!("Reconciliation disabled; waiting for shutdown only");
        None
    };

    info!("AuditVault running");
    coordinator.wait_for_shutdown().await;
    info!("Shutting down AuditVault gracefully...");

    if let Some(handle) = handle {
        handle.join().await?;
    }

    info!("AuditVault shutdown complete");
    Ok(())
}
