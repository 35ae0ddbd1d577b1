//! Common test utilities for integration tests.

pub mod fixtures;

use auditvault::clock::{Clock, ManualClock};
use auditvault::config::VaultConfig;
use auditvault::retention::{ArchiveManager, LegalHoldManager};
use auditvault::{ArchiveId, RecordCategory, RetentionSystem};
use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub use fixtures::*;

/// Test environment: a retention system in a temporary directory, driven by
/// a manual clock.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config: VaultConfig,
    pub clock: ManualClock,
    pub system: RetentionSystem,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Builds an environment after letting `adjust` modify the config.
    pub fn with_config(adjust: impl FnOnce(&mut VaultConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = VaultConfig::rooted_at(temp_dir.path());
        config.reconciliation.retry_backoff = std::time::Duration::from_millis(1);
        adjust(&mut config);

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap());
        let system = RetentionSystem::open_with_clock(config.clone(), Arc::new(clock.clone()))
            .expect("Failed to open retention system");

        Self {
            temp_dir,
            config,
            clock,
            system,
        }
    }

    /// Reopens the system over the same directories, as after a restart.
    pub fn reopen(&mut self) {
        self.system = RetentionSystem::open_with_clock(
            self.config.clone(),
            Arc::new(self.clock.clone()),
        )
        .expect("Failed to reopen retention system");
    }

    pub fn archives(&self) -> &ArchiveManager {
        self.system.archives()
    }

    pub fn holds(&self) -> &LegalHoldManager {
        self.system.holds()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Moves the clock forward by whole calendar years.
    pub fn advance_years(&self, years: u32) {
        let target = self
            .clock
            .now()
            .checked_add_months(Months::new(years * 12))
            .expect("date in range");
        self.clock.set(target);
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    /// Creates an archive of `records` generated JSON lines covering the
    /// previous day.
    pub async fn create_archive(&self, category: RecordCategory, records: usize) -> ArchiveId {
        let end = self.now();
        let start = end - Duration::days(1);
        let payload = AuditPayloadGenerator::default().jsonl(records, start, end);
        self.archives()
            .create_archive(category, start, end, payload)
            .await
            .expect("Failed to create archive")
    }

    /// Path of the sealed payload for `archive_id`.
    pub fn blob_path(&self, archive_id: &str) -> PathBuf {
        self.config.storage.blob_dir.join(format!("{}.enc", archive_id))
    }

    /// Path of the wrapped data key for `archive_id`.
    pub fn key_path(&self, archive_id: &str) -> PathBuf {
        self.config.storage.key_dir.join(format!("dek-{}.key", archive_id))
    }

    /// Flips one bit of the stored ciphertext.
    pub fn corrupt_blob(&self, archive_id: &str, offset: usize) {
        let path = self.blob_path(archive_id);
        let mut bytes = std::fs::read(&path).expect("Failed to read blob");
        let offset = offset.min(bytes.len() - 1);
        bytes[offset] ^= 0x01;
        std::fs::write(&path, bytes).expect("Failed to write blob");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
