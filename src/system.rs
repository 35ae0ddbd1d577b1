//! Composition root.
//!
//! [`RetentionSystem`] wires the catalog, key vault, blob store, policy
//! registry and event bus together and hands out the managers that operate
//! on them. Policy overrides stored in the catalog are applied on open.

use crate::blob_store::EncryptedBlobStore;
use crate::catalog::Catalog;
use crate::clock::{SharedClock, SystemClock};
use crate::compression::CompressionConfig;
use crate::config::VaultConfig;
use crate::error::Result;
use crate::events::{EventBus, RetentionEvent};
use crate::keys::{FileKeyVault, KeyVault};
use crate::reconcile::Reconciler;
use crate::retention::{
    ArchiveManager, LegalHoldManager, OperationQuery, OperationRecord, PolicyRegistry,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A fully wired retention subsystem.
#[derive(Debug)]
pub struct RetentionSystem {
    config: VaultConfig,
    catalog: Arc<Catalog>,
    events: Arc<EventBus>,
    clock: SharedClock,
    archives: ArchiveManager,
    holds: LegalHoldManager,
}

impl RetentionSystem {
    /// Opens the subsystem with the system clock.
    pub fn open(config: VaultConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Opens the subsystem with an injected clock.
    pub fn open_with_clock(config: VaultConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config.storage.catalog_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let catalog = Arc::new(Catalog::open(&config.storage.catalog_path)?);

        let keys: Arc<dyn KeyVault> = Arc::new(FileKeyVault::open(&config.storage.key_dir)?);
        let blobs = Arc::new(EncryptedBlobStore::new(
            &config.storage.blob_dir,
            keys,
            CompressionConfig {
                level: config.storage.compression_level,
            },
        )?);

        let policies = Arc::new(PolicyRegistry::with_defaults());
        let overrides = catalog.read(|tx| tx.load_policies())?;
        for policy in overrides {
            debug!(category = %policy.category, "Applying stored policy override");
            policies.install(policy);
        }

        let events = Arc::new(EventBus::new());
        let archives = ArchiveManager::new(
            catalog.clone(),
            blobs,
            policies.clone(),
            events.clone(),
            clock.clone(),
            config.reconciliation.expiring_window_days,
        );
        let holds = LegalHoldManager::new(catalog.clone(), policies, events.clone(), clock.clone());

        info!(
            blob_dir = %config.storage.blob_dir.display(),
            key_dir = %config.storage.key_dir.display(),
            catalog = %config.storage.catalog_path.display(),
            "Retention system opened"
        );

        Ok(Self {
            config,
            catalog,
            events,
            clock,
            archives,
            holds,
        })
    }

    pub fn archives(&self) -> &ArchiveManager {
        &self.archives
    }

    pub fn holds(&self) -> &LegalHoldManager {
        &self.holds
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RetentionEvent> {
        self.events.subscribe()
    }

    /// Newest-first operational log entries matching `query`.
    pub fn query_operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>> {
        self.catalog.query_operations(query)
    }

    /// Builds the background loop over this system's components.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.archives.clone(),
            self.catalog.clone(),
            self.events.clone(),
            self.clock.clone(),
            self.config.reconciliation.clone(),
        )
    }
}
