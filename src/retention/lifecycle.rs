// Archive lifecycle management

use super::oplog::{OperationKind, OperationRecord};
use super::policy::{PolicyRegistry, PolicyUpdate, RetentionPolicy};
use super::SYSTEM_ACTOR;
use crate::blob_store::EncryptedBlobStore;
use crate::catalog::{ArchiveQuery, Catalog};
use crate::clock::SharedClock;
use crate::error::{Result, VaultError};
use crate::events::{EventBus, RetentionEvent};
use crate::observability;
use crate::types::{new_archive_id, ArchiveId, AuditArchive, RecordCategory, RetentionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Input for a new archive
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub category: RecordCategory,
    /// Earliest source event in the payload
    pub start_date: DateTime<Utc>,
    /// Latest source event in the payload
    pub end_date: DateTime<Utc>,
    pub payload: Vec<u8>,
    /// Records in the payload; counted as non-blank lines when unset
    pub record_count: Option<u64>,
    /// Producer recorded in the operational log
    pub actor: String,
}

impl ArchiveRequest {
    pub fn new(
        category: RecordCategory,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            category,
            start_date,
            end_date,
            payload: payload.into(),
            record_count: None,
            actor: "producer".to_string(),
        }
    }

    pub fn with_record_count(mut self, record_count: u64) -> Self {
        self.record_count = Some(record_count);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    fn effective_record_count(&self) -> u64 {
        self.record_count.unwrap_or_else(|| {
            self.payload
                .split(|b| *b == b'\n')
                .filter(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
                .count() as u64
        })
    }
}

/// Explicit approval required to purge an expired archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeApproval {
    pub approved_by: String,
    pub reason: String,
}

/// Outcome of a purge eligibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeEligibility {
    pub archive_id: ArchiveId,
    pub eligible: bool,
    /// Why the archive cannot be purged
    pub reason: Option<String>,
}

/// ACTIVE archive approaching its expiration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringArchive {
    pub archive_id: ArchiveId,
    pub category: RecordCategory,
    pub expiration_date: DateTime<Utc>,
}

/// Snapshot for the compliance dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionStatusReport {
    pub generated_at: DateTime<Utc>,
    pub total_archives: u64,
    pub counts_by_status: BTreeMap<RetentionStatus, u64>,
    pub active_legal_holds: u64,
    /// Ciphertext bytes for archives that have not been purged
    pub stored_bytes: u64,
    pub expiring_window_days: u32,
    pub expiring_soon: Vec<ExpiringArchive>,
}

/// Status an archive returns to when its hold is released.
///
/// An archive whose expiration passed while held goes straight to EXPIRED.
pub(crate) fn status_after_release(
    expiration_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> RetentionStatus {
    match expiration_date {
        Some(expiration) if expiration <= now => RetentionStatus::Expired,
        _ => RetentionStatus::Active,
    }
}

/// Owner of the archive catalog and its ACTIVE/EXPIRED/PURGED transitions
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    catalog: Arc<Catalog>,
    blobs: Arc<EncryptedBlobStore>,
    policies: Arc<PolicyRegistry>,
    events: Arc<EventBus>,
    clock: SharedClock,
    expiring_window_days: u32,
}

impl ArchiveManager {
    pub fn new(
        catalog: Arc<Catalog>,
        blobs: Arc<EncryptedBlobStore>,
        policies: Arc<PolicyRegistry>,
        events: Arc<EventBus>,
        clock: SharedClock,
        expiring_window_days: u32,
    ) -> Self {
        Self {
            catalog,
            blobs,
            policies,
            events,
            clock,
            expiring_window_days,
        }
    }

    /// Archives `payload` and returns the new archive id
    pub async fn create_archive(
        &self,
        category: RecordCategory,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Result<ArchiveId> {
        self.create(ArchiveRequest::new(category, start_date, end_date, payload))
            .await
    }

    /// Archives a fully specified request on the blocking pool
    pub async fn create(&self, request: ArchiveRequest) -> Result<ArchiveId> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.create_blocking(request)).await?
    }

    pub fn create_blocking(&self, request: ArchiveRequest) -> Result<ArchiveId> {
        if request.start_date > request.end_date {
            return Err(VaultError::InvalidArgument(format!(
                "start date {} is after end date {}",
                request.start_date, request.end_date
            )));
        }

        let now = self.clock.now();
        let category = request.category;
        let policy = self.policies.policy_for(category);
        let expiration_date = policy.expiration_from(now)?;
        let archive_id = new_archive_id(category, now);
        let record_count = request.effective_record_count();

        let blob = self
            .blobs
            .store_archive(&archive_id, category, &request.payload)?;

        let archive = AuditArchive {
            archive_id: archive_id.clone(),
            category,
            creation_date: now,
            start_date: request.start_date,
            end_date: request.end_date,
            record_count,
            payload_size: blob.payload_size,
            compressed_size: blob.compressed_size,
            integrity_digest: blob.integrity_digest.clone(),
            encryption_key_id: blob.key_id.clone(),
            retention_status: RetentionStatus::Active,
            legal_hold_id: None,
            expiration_date: Some(expiration_date),
            last_verified: None,
            purged_at: None,
            purged_by: None,
        };
        let op = OperationRecord::new(OperationKind::ArchiveCreated, request.actor.as_str(), now)
            .with_archive(archive_id.as_str())
            .with_detail(format!("{} records, {} bytes", record_count, blob.payload_size));

        let written = self.catalog.write(|tx| {
            tx.insert_archive(&archive)?;
            tx.append_operation(&op)?;
            Ok(())
        });
        if let Err(e) = written {
            // The row never landed, so the blob and key are unreachable.
            if let Err(cleanup) = self.blobs.shred(&archive_id, &blob.key_id) {
                error!(archive_id = %archive_id, error = %cleanup, "Failed to remove orphaned blob");
            }
            return Err(e);
        }

        observability::record_archive_created(category, blob.payload_size, blob.stored_size);
        info!(
            archive_id = %archive_id,
            category = %category,
            record_count,
            expiration_date = %expiration_date,
            "Archive created"
        );
        self.events.publish(RetentionEvent::ArchiveCreated {
            archive_id: archive_id.clone(),
            category,
            expiration_date,
        });

        Ok(archive_id)
    }

    /// Re-reads the stored ciphertext and checks it against the catalog digest
    pub async fn verify_archive_integrity(&self, archive_id: &str) -> Result<bool> {
        let this = self.clone();
        let archive_id = archive_id.to_string();
        tokio::task::spawn_blocking(move || this.verify_blocking(&archive_id)).await?
    }

    /// Returns false on mismatch or a missing ciphertext. The catalog row is
    /// left exactly as it was.
    pub fn verify_blocking(&self, archive_id: &str) -> Result<bool> {
        let archive = self.require(archive_id)?;
        let ok = self.check_ciphertext(&archive)?;

        let now = self.clock.now();
        if ok {
            self.record_verified(archive_id, now)?;
        } else {
            self.record_violation(archive_id, now);
        }
        Ok(ok)
    }

    /// Compares the stored ciphertext against the digest of `archive`, a
    /// row read before the blob.
    fn check_ciphertext(&self, archive: &AuditArchive) -> Result<bool> {
        let archive_id = archive.archive_id.as_str();
        if !archive.has_payload() {
            return Err(purged(archive_id));
        }

        match self.blobs.read_ciphertext(archive_id) {
            Ok(sealed) => self.blobs.verify_integrity(
                archive_id,
                archive.category,
                &sealed,
                &archive.integrity_digest,
            ),
            Err(VaultError::NotFound(_)) => {
                // A purge may have shredded the blob after the row was read.
                if !self.require(archive_id)?.has_payload() {
                    return Err(purged(archive_id));
                }
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn record_verified(&self, archive_id: &str, now: DateTime<Utc>) -> Result<()> {
        observability::record_integrity_check(true);
        self.catalog.write(|tx| {
            tx.touch_verified(archive_id, now)?;
            tx.append_operation(
                &OperationRecord::new(OperationKind::IntegrityVerified, SYSTEM_ACTOR, now)
                    .with_archive(archive_id),
            )?;
            Ok(())
        })?;

        debug!(archive_id = %archive_id, "Integrity verified");
        self.events.publish(RetentionEvent::IntegrityVerified {
            archive_id: archive_id.to_string(),
        });
        Ok(())
    }

    fn record_violation(&self, archive_id: &str, now: DateTime<Utc>) {
        observability::record_integrity_check(false);
        warn!(archive_id = %archive_id, verified = false, "Integrity verification failed");
        self.events.publish(RetentionEvent::IntegrityViolation {
            archive_id: archive_id.to_string(),
            detected_at: now,
        });

        let logged = self.catalog.write(|tx| {
            tx.append_operation(
                &OperationRecord::new(OperationKind::IntegrityViolation, SYSTEM_ACTOR, now)
                    .with_archive(archive_id)
                    .failed("stored ciphertext does not match catalog digest"),
            )
        });
        if let Err(e) = logged {
            error!(archive_id = %archive_id, error = %e, "Failed to log integrity violation");
        }
    }

    /// Moves every ACTIVE archive due at `now` to EXPIRED.
    ///
    /// Held archives are never touched. This is the only path to EXPIRED
    /// apart from hold release catch-up.
    pub async fn expire_due_archives(&self, now: DateTime<Utc>) -> Result<Vec<ArchiveId>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.expire_due_blocking(now)).await?
    }

    pub fn expire_due_blocking(&self, now: DateTime<Utc>) -> Result<Vec<ArchiveId>> {
        let expired = self.catalog.write(|tx| {
            let ids = tx.expire_due(now)?;
            for id in &ids {
                tx.append_operation(
                    &OperationRecord::new(OperationKind::ArchiveExpired, SYSTEM_ACTOR, now)
                        .with_archive(id.as_str()),
                )?;
            }
            Ok(ids)
        })?;

        if !expired.is_empty() {
            observability::record_expired(expired.len());
            info!(count = expired.len(), "Expired due archives");
        }
        for archive_id in &expired {
            debug!(archive_id = %archive_id, "Archive expired");
            self.events.publish(RetentionEvent::ArchiveExpired {
                archive_id: archive_id.clone(),
            });
        }

        Ok(expired)
    }

    /// Checks whether an archive could be purged, without acting
    pub fn purge_eligibility(&self, archive_id: &str) -> Result<PurgeEligibility> {
        let archive = self.require(archive_id)?;
        let reason = self.purge_blocker(&archive);
        Ok(PurgeEligibility {
            archive_id: archive.archive_id,
            eligible: reason.is_none(),
            reason,
        })
    }

    fn purge_blocker(&self, archive: &AuditArchive) -> Option<String> {
        if archive.retention_status != RetentionStatus::Expired {
            return Some(format!(
                "archive {} is {}; only EXPIRED archives can be purged",
                archive.archive_id, archive.retention_status
            ));
        }

        let policy = self.policies.policy_for(archive.category);
        if !policy.purge_approved {
            return Some(format!(
                "retention policy for {} does not approve purging",
                archive.category
            ));
        }

        None
    }

    /// Destroys the ciphertext and key of an expired archive.
    ///
    /// The catalog row is kept as PURGED with the approver recorded.
    pub async fn purge_archive(&self, archive_id: &str, approval: PurgeApproval) -> Result<AuditArchive> {
        let this = self.clone();
        let archive_id = archive_id.to_string();
        tokio::task::spawn_blocking(move || this.purge_blocking(&archive_id, &approval)).await?
    }

    pub fn purge_blocking(&self, archive_id: &str, approval: &PurgeApproval) -> Result<AuditArchive> {
        if approval.approved_by.trim().is_empty() {
            return Err(VaultError::PolicyViolation(
                "purge requires a named approver".to_string(),
            ));
        }

        let archive = self.require(archive_id)?;
        if let Some(reason) = self.purge_blocker(&archive) {
            warn!(archive_id = %archive_id, reason = %reason, "Purge rejected");
            return Err(VaultError::PolicyViolation(reason));
        }

        let now = self.clock.now();
        self.catalog.write(|tx| {
            if !tx.mark_purged(archive_id, now, &approval.approved_by)? {
                return Err(VaultError::Conflict(format!(
                    "archive {} changed status during purge",
                    archive_id
                )));
            }
            tx.append_operation(
                &OperationRecord::new(OperationKind::ArchivePurged, approval.approved_by.as_str(), now)
                    .with_archive(archive_id)
                    .with_detail(approval.reason.as_str()),
            )?;
            // Shred inside the transaction so a failure leaves the row EXPIRED.
            self.blobs.shred(archive_id, &archive.encryption_key_id)?;
            Ok(())
        })?;

        observability::record_purge();
        info!(
            archive_id = %archive_id,
            approved_by = %approval.approved_by,
            "Archive purged"
        );
        self.events.publish(RetentionEvent::ArchivePurged {
            archive_id: archive_id.to_string(),
            approved_by: approval.approved_by.clone(),
        });

        self.require(archive_id)
    }

    /// Returns the original payload after verifying integrity
    pub async fn retrieve_archive(&self, archive_id: &str) -> Result<Vec<u8>> {
        let this = self.clone();
        let archive_id = archive_id.to_string();
        tokio::task::spawn_blocking(move || this.retrieve_blocking(&archive_id)).await?
    }

    pub fn retrieve_blocking(&self, archive_id: &str) -> Result<Vec<u8>> {
        let archive = self.require(archive_id)?;
        if !archive.has_payload() {
            return Err(VaultError::NotFound(format!(
                "payload of archive {} was purged",
                archive_id
            )));
        }

        let sealed = self.blobs.read_ciphertext(archive_id)?;
        let ok = self.blobs.verify_integrity(
            archive_id,
            archive.category,
            &sealed,
            &archive.integrity_digest,
        )?;
        if !ok {
            self.record_violation(archive_id, self.clock.now());
            return Err(VaultError::IntegrityViolation {
                archive_id: archive_id.to_string(),
            });
        }

        self.blobs.open_ciphertext(
            archive_id,
            &archive.encryption_key_id,
            &sealed,
            archive.payload_size,
        )
    }

    pub fn get_archive(&self, archive_id: &str) -> Result<AuditArchive> {
        self.require(archive_id)
    }

    pub fn list_archives(&self, query: &ArchiveQuery) -> Result<Vec<AuditArchive>> {
        self.catalog.list_archives(query)
    }

    /// Counts, holds, stored bytes and archives nearing expiration
    pub fn get_retention_status(&self) -> Result<RetentionStatusReport> {
        let now = self.clock.now();
        let until = now + Duration::days(i64::from(self.expiring_window_days));

        let (counts, active_legal_holds, stored_bytes, expiring) = self.catalog.read(|tx| {
            Ok((
                tx.status_counts()?,
                tx.active_hold_count()?,
                tx.stored_bytes()?,
                tx.expiring_between(now, until)?,
            ))
        })?;

        observability::update_status_gauges(&counts);

        Ok(RetentionStatusReport {
            generated_at: now,
            total_archives: counts.iter().map(|(_, c)| c).sum(),
            counts_by_status: counts.into_iter().collect(),
            active_legal_holds,
            stored_bytes,
            expiring_window_days: self.expiring_window_days,
            expiring_soon: expiring
                .into_iter()
                .filter_map(|a| {
                    a.expiration_date.map(|expiration_date| ExpiringArchive {
                        archive_id: a.archive_id,
                        category: a.category,
                        expiration_date,
                    })
                })
                .collect(),
        })
    }

    /// Policy currently in force for each category
    pub fn policies(&self) -> Vec<RetentionPolicy> {
        self.policies.all()
    }

    /// Replaces a category's policy. Requests below the 7-year floor are
    /// refused.
    pub fn override_policy(
        &self,
        category: RecordCategory,
        update: PolicyUpdate,
        approved_by: &str,
    ) -> Result<RetentionPolicy> {
        if approved_by.trim().is_empty() {
            return Err(VaultError::InvalidArgument(
                "policy override requires a named approver".to_string(),
            ));
        }

        let policy = update.into_policy(category)?;
        let now = self.clock.now();
        self.catalog.write(|tx| {
            tx.upsert_policy(&policy, now, approved_by)?;
            tx.append_operation(
                &OperationRecord::new(OperationKind::PolicyOverridden, approved_by, now).with_detail(
                    format!(
                        "{}: {} years, archive after {} days, legal hold {}, purge approved {}",
                        category,
                        policy.retention_years,
                        policy.archive_after_days,
                        policy.legal_hold_capable,
                        policy.purge_approved
                    ),
                ),
            )?;
            Ok(())
        })?;
        self.policies.install(policy.clone());

        info!(
            category = %category,
            retention_years = policy.retention_years,
            purge_approved = policy.purge_approved,
            approved_by = %approved_by,
            "Retention policy overridden"
        );
        Ok(policy)
    }

    fn require(&self, archive_id: &str) -> Result<AuditArchive> {
        self.catalog
            .get_archive(archive_id)?
            .ok_or_else(|| VaultError::NotFound(format!("archive {}", archive_id)))
    }
}

fn purged(archive_id: &str) -> VaultError {
    VaultError::InvalidState(format!("archive {} has been purged", archive_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::compression::CompressionConfig;
    use crate::keys::FileKeyVault;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ManualClock, ArchiveManager) {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let keys = FileKeyVault::open(dir.path().join("keys")).unwrap();
        let blobs = EncryptedBlobStore::new(
            dir.path().join("blobs"),
            Arc::new(keys),
            CompressionConfig::default(),
        )
        .unwrap();
        let manager = ArchiveManager::new(
            Arc::new(Catalog::open_in_memory().unwrap()),
            Arc::new(blobs),
            Arc::new(PolicyRegistry::with_defaults()),
            Arc::new(EventBus::new()),
            Arc::new(clock.clone()),
            30,
        );
        (dir, clock, manager)
    }

    #[test]
    fn test_status_after_release() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            status_after_release(Some(now - Duration::seconds(1)), now),
            RetentionStatus::Expired
        );
        assert_eq!(status_after_release(Some(now), now), RetentionStatus::Expired);
        assert_eq!(
            status_after_release(Some(now + Duration::days(1)), now),
            RetentionStatus::Active
        );
        assert_eq!(status_after_release(None, now), RetentionStatus::Active);
    }

    #[test]
    fn test_record_count_defaults_to_lines() {
        let request = ArchiveRequest::new(
            RecordCategory::SecurityEvent,
            Utc::now(),
            Utc::now(),
            b"{\"a\":1}\n\n{\"a\":2}\n  \n{\"a\":3}".to_vec(),
        );
        assert_eq!(request.effective_record_count(), 3);
        assert_eq!(request.with_record_count(10).effective_record_count(), 10);
    }

    #[test]
    fn test_create_sets_expiration_from_policy() {
        let (_dir, clock, manager) = manager();
        let start = clock.now() - Duration::days(30);
        let id = manager
            .create_blocking(ArchiveRequest::new(
                RecordCategory::ComplianceEvent,
                start,
                clock.now(),
                b"line-1\nline-2".to_vec(),
            ))
            .unwrap();

        let archive = manager.get_archive(&id).unwrap();
        assert_eq!(archive.retention_status, RetentionStatus::Active);
        assert_eq!(archive.record_count, 2);
        assert_eq!(archive.payload_size, 13);
        assert_eq!(archive.creation_date, clock.now());
        assert_eq!(
            archive.expiration_date,
            Some(Utc.with_ymd_and_hms(2036, 3, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_create_rejects_inverted_range() {
        let (_dir, clock, manager) = manager();
        let result = manager.create_blocking(ArchiveRequest::new(
            RecordCategory::SystemEvent,
            clock.now(),
            clock.now() - Duration::seconds(1),
            b"x".to_vec(),
        ));
        assert!(matches!(result, Err(VaultError::InvalidArgument(_))));
        assert!(manager.list_archives(&ArchiveQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_archive_is_not_found() {
        let (_dir, _clock, manager) = manager();
        assert!(matches!(
            manager.verify_blocking("missing"),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            manager.purge_eligibility("missing"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_blob_shredded_after_row_read_is_not_a_violation() {
        let (_dir, clock, manager) = manager();
        let mut events = manager.events.subscribe();
        let update = PolicyUpdate {
            retention_years: 7,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: true,
        };
        manager
            .override_policy(RecordCategory::SystemEvent, update, "cco")
            .unwrap();
        let id = manager
            .create_blocking(ArchiveRequest::new(
                RecordCategory::SystemEvent,
                clock.now(),
                clock.now(),
                b"boot".to_vec(),
            ))
            .unwrap();

        clock.advance(Duration::days(365 * 8));
        manager.expire_due_blocking(clock.now()).unwrap();
        let stale = manager.get_archive(&id).unwrap();
        let approval = PurgeApproval {
            approved_by: "cco".to_string(),
            reason: "retention elapsed".to_string(),
        };
        manager.purge_blocking(&id, &approval).unwrap();

        assert!(matches!(
            manager.check_ciphertext(&stale),
            Err(VaultError::InvalidState(_))
        ));
        assert!(matches!(
            manager.verify_blocking(&id),
            Err(VaultError::InvalidState(_))
        ));
        while let Ok(event) = events.try_recv() {
            assert!(!event.is_critical(), "unexpected {:?}", event);
        }
    }

    #[test]
    fn test_override_policy_rejects_unbounded_retention() {
        let (_dir, clock, manager) = manager();
        for years in [1_000_000, u32::MAX] {
            let update = PolicyUpdate {
                retention_years: years,
                archive_after_days: 30,
                legal_hold_capable: true,
                purge_approved: false,
            };
            assert!(matches!(
                manager.override_policy(RecordCategory::SystemEvent, update, "cco"),
                Err(VaultError::PolicyViolation(_))
            ));
        }

        assert!(manager.catalog.read(|tx| tx.load_policies()).unwrap().is_empty());
        let id = manager
            .create_blocking(ArchiveRequest::new(
                RecordCategory::SystemEvent,
                clock.now(),
                clock.now(),
                b"still archivable".to_vec(),
            ))
            .unwrap();
        assert!(manager.get_archive(&id).unwrap().expiration_date.is_some());
    }

    #[test]
    fn test_override_policy_persists_and_rejects_floor() {
        let (_dir, _clock, manager) = manager();
        let below = PolicyUpdate {
            retention_years: 5,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: true,
        };
        assert!(matches!(
            manager.override_policy(RecordCategory::SystemEvent, below, "cco"),
            Err(VaultError::PolicyViolation(_))
        ));

        let update = PolicyUpdate {
            retention_years: 8,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: true,
        };
        manager
            .override_policy(RecordCategory::SystemEvent, update, "cco")
            .unwrap();

        let stored = manager.catalog.read(|tx| tx.load_policies()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].retention_years, 8);
        assert!(
            manager
                .policies()
                .iter()
                .any(|p| p.category == RecordCategory::SystemEvent && p.purge_approved)
        );
    }
}
