// Retention policy registry

use crate::error::{Result, VaultError};
use crate::types::RecordCategory;
use chrono::{DateTime, Months, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Statutory minimum retention. No policy may keep archives for less.
pub const MIN_RETENTION_YEARS: u32 = 7;

/// Longest retention a policy may request.
pub const MAX_RETENTION_YEARS: u32 = 100;

/// Retention rules for one record category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Category this policy governs
    pub category: RecordCategory,
    /// Years an archive is kept after creation (never below 7)
    pub retention_years: u32,
    /// Age at which live records should be moved into the vault
    pub archive_after_days: u32,
    /// Whether legal holds may be placed on this category
    pub legal_hold_capable: bool,
    /// Whether expired archives may be purged at all
    pub purge_approved: bool,
}

impl RetentionPolicy {
    /// Creates a policy, raising `retention_years` to the statutory floor
    /// and lowering it to [`MAX_RETENTION_YEARS`]
    pub fn new(
        category: RecordCategory,
        retention_years: u32,
        archive_after_days: u32,
        legal_hold_capable: bool,
        purge_approved: bool,
    ) -> Self {
        if retention_years < MIN_RETENTION_YEARS {
            warn!(
                category = %category,
                requested = retention_years,
                floor = MIN_RETENTION_YEARS,
                "Retention below statutory floor, clamping"
            );
        } else if retention_years > MAX_RETENTION_YEARS {
            warn!(
                category = %category,
                requested = retention_years,
                ceiling = MAX_RETENTION_YEARS,
                "Retention above ceiling, clamping"
            );
        }

        Self {
            category,
            retention_years: retention_years.clamp(MIN_RETENTION_YEARS, MAX_RETENTION_YEARS),
            archive_after_days,
            legal_hold_capable,
            purge_approved,
        }
    }

    /// Built-in policy for a category
    pub fn default_for(category: RecordCategory) -> Self {
        let (years, archive_after_days) = match category {
            RecordCategory::EncryptionEvent => (7, 90),
            RecordCategory::SecurityEvent => (7, 90),
            RecordCategory::AdminAction => (7, 365),
            RecordCategory::SystemEvent => (7, 30),
            RecordCategory::ComplianceEvent => (10, 365),
        };
        Self::new(category, years, archive_after_days, true, false)
    }

    /// Expiration for an archive created at `created`
    pub fn expiration_from(&self, created: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.retention_years
            .checked_mul(12)
            .and_then(|months| created.checked_add_months(Months::new(months)))
            .ok_or_else(|| {
                VaultError::InvalidState(format!(
                    "expiration of {} + {} years is out of range",
                    created, self.retention_years
                ))
            })
    }
}

/// Requested replacement of a category's policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub retention_years: u32,
    pub archive_after_days: u32,
    pub legal_hold_capable: bool,
    pub purge_approved: bool,
}

impl PolicyUpdate {
    /// Validates the update for `category`.
    ///
    /// Unlike [`RetentionPolicy::new`], an explicit request outside
    /// `MIN_RETENTION_YEARS..=MAX_RETENTION_YEARS` is refused rather than
    /// clamped.
    pub fn into_policy(self, category: RecordCategory) -> Result<RetentionPolicy> {
        if self.retention_years < MIN_RETENTION_YEARS {
            return Err(VaultError::PolicyViolation(format!(
                "retention of {} years for {} is below the {}-year minimum",
                self.retention_years, category, MIN_RETENTION_YEARS
            )));
        }
        if self.retention_years > MAX_RETENTION_YEARS {
            return Err(VaultError::PolicyViolation(format!(
                "retention of {} years for {} exceeds the {}-year maximum",
                self.retention_years, category, MAX_RETENTION_YEARS
            )));
        }

        Ok(RetentionPolicy::new(
            category,
            self.retention_years,
            self.archive_after_days,
            self.legal_hold_capable,
            self.purge_approved,
        ))
    }
}

impl From<&RetentionPolicy> for PolicyUpdate {
    fn from(p: &RetentionPolicy) -> Self {
        Self {
            retention_years: p.retention_years,
            archive_after_days: p.archive_after_days,
            legal_hold_capable: p.legal_hold_capable,
            purge_approved: p.purge_approved,
        }
    }
}

/// Policy lookup table, one entry per category
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: RwLock<BTreeMap<RecordCategory, RetentionPolicy>>,
}

impl PolicyRegistry {
    /// Registry holding the built-in table
    pub fn with_defaults() -> Self {
        let policies = RecordCategory::ALL
            .into_iter()
            .map(|c| (c, RetentionPolicy::default_for(c)))
            .collect();
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// Policy in force for `category`
    pub fn policy_for(&self, category: RecordCategory) -> RetentionPolicy {
        self.policies
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_else(|| RetentionPolicy::default_for(category))
    }

    /// All policies in category order
    pub fn all(&self) -> Vec<RetentionPolicy> {
        self.policies.read().values().cloned().collect()
    }

    /// Installs a policy, replacing the previous one for its category.
    ///
    /// Entries are replaced, never removed.
    pub(crate) fn install(&self, policy: RetentionPolicy) {
        // Re-apply the floor in case the policy came from storage.
        let policy = RetentionPolicy::new(
            policy.category,
            policy.retention_years,
            policy.archive_after_days,
            policy.legal_hold_capable,
            policy.purge_approved,
        );
        self.policies.write().insert(policy.category, policy);
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_floor_clamp() {
        for years in [0, 1, 6] {
            let policy = RetentionPolicy::new(RecordCategory::SystemEvent, years, 30, true, false);
            assert_eq!(policy.retention_years, MIN_RETENTION_YEARS);
        }
        let policy = RetentionPolicy::new(RecordCategory::SystemEvent, 12, 30, true, false);
        assert_eq!(policy.retention_years, 12);
    }

    #[test]
    fn test_defaults_respect_floor_and_require_purge_approval() {
        let registry = PolicyRegistry::with_defaults();
        let all = registry.all();
        assert_eq!(all.len(), RecordCategory::ALL.len());
        for policy in all {
            assert!(policy.retention_years >= MIN_RETENTION_YEARS);
            assert!(!policy.purge_approved);
            assert!(policy.legal_hold_capable);
        }
        assert_eq!(registry.policy_for(RecordCategory::AdminAction).retention_years, 7);
        assert_eq!(registry.policy_for(RecordCategory::ComplianceEvent).retention_years, 10);
    }

    #[test]
    fn test_update_below_floor_rejected() {
        let update = PolicyUpdate {
            retention_years: 3,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: true,
        };
        assert!(matches!(
            update.into_policy(RecordCategory::SecurityEvent),
            Err(VaultError::PolicyViolation(_))
        ));
    }

    #[test]
    fn test_update_above_ceiling_rejected() {
        for years in [MAX_RETENTION_YEARS + 1, 1_000_000, u32::MAX] {
            let update = PolicyUpdate {
                retention_years: years,
                archive_after_days: 30,
                legal_hold_capable: true,
                purge_approved: false,
            };
            assert!(matches!(
                update.into_policy(RecordCategory::SystemEvent),
                Err(VaultError::PolicyViolation(_))
            ));
        }

        let update = PolicyUpdate {
            retention_years: MAX_RETENTION_YEARS,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: false,
        };
        let policy = update.into_policy(RecordCategory::SystemEvent).unwrap();
        let created = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            policy.expiration_from(created).unwrap(),
            Utc.with_ymd_and_hms(2126, 1, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_oversized_retention_clamped_and_never_overflows() {
        let policy = RetentionPolicy::new(RecordCategory::SystemEvent, u32::MAX, 30, true, false);
        assert_eq!(policy.retention_years, MAX_RETENTION_YEARS);

        // Built without the constructor, as a corrupted stored row could be.
        let raw = RetentionPolicy {
            category: RecordCategory::SystemEvent,
            retention_years: u32::MAX,
            archive_after_days: 30,
            legal_hold_capable: true,
            purge_approved: false,
        };
        let created = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert!(matches!(
            raw.expiration_from(created),
            Err(VaultError::InvalidState(_))
        ));
    }

    #[test]
    fn test_install_replaces_and_clamps() {
        let registry = PolicyRegistry::with_defaults();
        registry.install(RetentionPolicy {
            category: RecordCategory::SecurityEvent,
            retention_years: 2,
            archive_after_days: 10,
            legal_hold_capable: false,
            purge_approved: true,
        });

        let policy = registry.policy_for(RecordCategory::SecurityEvent);
        assert_eq!(policy.retention_years, MIN_RETENTION_YEARS);
        assert!(policy.purge_approved);
        assert!(!policy.legal_hold_capable);
    }

    #[test]
    fn test_expiration_uses_calendar_years() {
        let policy = RetentionPolicy::default_for(RecordCategory::SecurityEvent);
        let created = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let expires = policy.expiration_from(created).unwrap();
        assert_eq!(expires, Utc.with_ymd_and_hms(2031, 2, 28, 12, 0, 0).unwrap());
    }
}
