// Legal hold management for archived audit records

use super::lifecycle::status_after_release;
use super::oplog::{OperationKind, OperationRecord};
use super::policy::PolicyRegistry;
use crate::catalog::Catalog;
use crate::clock::SharedClock;
use crate::error::{Result, VaultError};
use crate::events::{EventBus, RetentionEvent};
use crate::observability;
use crate::types::{new_hold_id, ArchiveId, HoldId, HoldStatus, LegalHold, RetentionStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Places and releases legal holds.
///
/// This is the only writer of hold rows and of the LEGAL_HOLD status.
#[derive(Debug, Clone)]
pub struct LegalHoldManager {
    catalog: Arc<Catalog>,
    policies: Arc<PolicyRegistry>,
    events: Arc<EventBus>,
    clock: SharedClock,
}

impl LegalHoldManager {
    pub fn new(
        catalog: Arc<Catalog>,
        policies: Arc<PolicyRegistry>,
        events: Arc<EventBus>,
        clock: SharedClock,
    ) -> Self {
        Self {
            catalog,
            policies,
            events,
            clock,
        }
    }

    /// Places a hold over `archive_ids` and returns its id
    pub async fn place_legal_hold(
        &self,
        case_reference: &str,
        requesting_attorney: &str,
        scope_description: &str,
        archive_ids: &[ArchiveId],
    ) -> Result<HoldId> {
        let this = self.clone();
        let case_reference = case_reference.to_string();
        let requesting_attorney = requesting_attorney.to_string();
        let scope_description = scope_description.to_string();
        let archive_ids = archive_ids.to_vec();
        tokio::task::spawn_blocking(move || {
            this.place_blocking(
                &case_reference,
                &requesting_attorney,
                &scope_description,
                &archive_ids,
            )
        })
        .await?
    }

    /// All archives are held or none are. An archive already under a hold
    /// is a conflict naming both the archive and the existing hold.
    pub fn place_blocking(
        &self,
        case_reference: &str,
        requesting_attorney: &str,
        scope_description: &str,
        archive_ids: &[ArchiveId],
    ) -> Result<HoldId> {
        if case_reference.trim().is_empty() {
            return Err(VaultError::InvalidArgument(
                "legal hold requires a case reference".to_string(),
            ));
        }
        if requesting_attorney.trim().is_empty() {
            return Err(VaultError::InvalidArgument(
                "legal hold requires a requesting attorney".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let archive_ids: Vec<ArchiveId> = archive_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if archive_ids.is_empty() {
            return Err(VaultError::InvalidArgument(
                "legal hold must name at least one archive".to_string(),
            ));
        }

        let now = self.clock.now();
        let hold = LegalHold {
            hold_id: new_hold_id(),
            case_reference: case_reference.to_string(),
            hold_date: now,
            requesting_attorney: requesting_attorney.to_string(),
            scope_description: scope_description.to_string(),
            affected_archive_ids: archive_ids.clone(),
            status: HoldStatus::Active,
            release_date: None,
            released_by: None,
        };

        self.catalog.write(|tx| {
            let mut previous = Vec::with_capacity(archive_ids.len());
            for archive_id in &archive_ids {
                let archive = tx
                    .get_archive(archive_id)?
                    .ok_or_else(|| VaultError::NotFound(format!("archive {}", archive_id)))?;

                if let Some(existing) = &archive.legal_hold_id {
                    return Err(VaultError::Conflict(format!(
                        "archive {} is already under legal hold {}",
                        archive_id, existing
                    )));
                }
                match archive.retention_status {
                    RetentionStatus::Active | RetentionStatus::Expired => {}
                    other => {
                        return Err(VaultError::InvalidState(format!(
                            "archive {} is {} and cannot be held",
                            archive_id, other
                        )))
                    }
                }
                if !self.policies.policy_for(archive.category).legal_hold_capable {
                    return Err(VaultError::PolicyViolation(format!(
                        "retention policy for {} does not allow legal holds",
                        archive.category
                    )));
                }
                previous.push(archive.retention_status);
            }

            tx.insert_hold(&hold)?;
            for (archive_id, from) in archive_ids.iter().zip(previous) {
                // Conditional on the status read above.
                if !tx.transition(
                    archive_id,
                    from,
                    RetentionStatus::LegalHold,
                    Some(hold.hold_id.as_str()),
                )? {
                    return Err(VaultError::Conflict(format!(
                        "archive {} changed status while placing hold",
                        archive_id
                    )));
                }
                tx.append_operation(
                    &OperationRecord::new(OperationKind::HoldPlaced, requesting_attorney, now)
                        .with_archive(archive_id.as_str())
                        .with_hold(hold.hold_id.as_str())
                        .with_detail(case_reference),
                )?;
            }
            Ok(())
        })?;

        observability::record_hold(true, archive_ids.len());
        info!(
            hold_id = %hold.hold_id,
            case_reference = %case_reference,
            archives = archive_ids.len(),
            "Legal hold placed"
        );
        self.events.publish(RetentionEvent::HoldPlaced {
            hold_id: hold.hold_id.clone(),
            archive_ids,
        });

        Ok(hold.hold_id)
    }

    /// Releases an active hold. Returns false if no active hold has this id.
    pub async fn release_legal_hold(&self, hold_id: &str, releasing_attorney: &str) -> Result<bool> {
        let this = self.clone();
        let hold_id = hold_id.to_string();
        let releasing_attorney = releasing_attorney.to_string();
        tokio::task::spawn_blocking(move || this.release_blocking(&hold_id, &releasing_attorney))
            .await?
    }

    /// Each formerly held archive goes back to ACTIVE, or straight to
    /// EXPIRED if its expiration passed while it was held.
    pub fn release_blocking(&self, hold_id: &str, releasing_attorney: &str) -> Result<bool> {
        if releasing_attorney.trim().is_empty() {
            return Err(VaultError::InvalidArgument(
                "releasing a legal hold requires an attorney".to_string(),
            ));
        }

        let now = self.clock.now();
        let released = self.catalog.write(|tx| {
            let hold = match tx.get_hold(hold_id)? {
                Some(hold) if hold.is_active() => hold,
                _ => return Ok(None),
            };
            if !tx.release_hold(hold_id, now, releasing_attorney)? {
                return Ok(None);
            }

            let mut reactivated = Vec::new();
            let mut expired = Vec::new();
            for archive_id in &hold.affected_archive_ids {
                let Some(archive) = tx.get_archive(archive_id)? else {
                    continue;
                };
                if archive.legal_hold_id.as_deref() != Some(hold_id) {
                    continue;
                }

                let target = status_after_release(archive.expiration_date, now);
                if !tx.transition(archive_id, RetentionStatus::LegalHold, target, None)? {
                    return Err(VaultError::Conflict(format!(
                        "archive {} changed status while releasing hold",
                        archive_id
                    )));
                }
                tx.append_operation(
                    &OperationRecord::new(OperationKind::HoldReleased, releasing_attorney, now)
                        .with_archive(archive_id.as_str())
                        .with_hold(hold_id)
                        .with_detail(format!("returned to {}", target)),
                )?;

                debug!(archive_id = %archive_id, status = %target, "Archive released from hold");
                match target {
                    RetentionStatus::Expired => expired.push(archive_id.clone()),
                    _ => reactivated.push(archive_id.clone()),
                }
            }
            Ok(Some((reactivated, expired)))
        })?;

        let Some((reactivated, expired)) = released else {
            warn!(hold_id = %hold_id, "No active legal hold to release");
            return Ok(false);
        };

        observability::record_hold(false, reactivated.len() + expired.len());
        if !expired.is_empty() {
            observability::record_expired(expired.len());
        }
        info!(
            hold_id = %hold_id,
            released_by = %releasing_attorney,
            reactivated = reactivated.len(),
            expired = expired.len(),
            "Legal hold released"
        );
        for archive_id in &expired {
            self.events.publish(RetentionEvent::ArchiveExpired {
                archive_id: archive_id.clone(),
            });
        }
        self.events.publish(RetentionEvent::HoldReleased {
            hold_id: hold_id.to_string(),
            reactivated,
            expired,
        });

        Ok(true)
    }

    pub fn get_hold(&self, hold_id: &str) -> Result<LegalHold> {
        self.catalog
            .get_hold(hold_id)?
            .ok_or_else(|| VaultError::NotFound(format!("legal hold {}", hold_id)))
    }

    pub fn list_holds(&self, active_only: bool) -> Result<Vec<LegalHold>> {
        self.catalog.read(|tx| tx.list_holds(active_only))
    }
}
