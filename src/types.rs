//! Core types for the audit vault.
//!
//! This module defines the catalog records shared by every component:
//!
//! - [`RecordCategory`]: the kind of audit data an archive holds
//! - [`RetentionStatus`]: the lifecycle state of an archive
//! - [`AuditArchive`]: one catalog row describing a stored archive
//! - [`LegalHold`]: a hold suspending expiration for a set of archives
//!
//! # Archive identifiers
//!
//! Archive ids are derived from the category and creation time plus a random
//! disambiguator, so concurrent creations within the same second never
//! collide:
//!
//! ```rust
//! use auditvault::types::{new_archive_id, RecordCategory};
//! use chrono::{TimeZone, Utc};
//!
//! let created = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
//! let id = new_archive_id(RecordCategory::AdminAction, created);
//! assert!(id.starts_with("admin-action-20260102T030405Z-"));
//! assert_ne!(id, new_archive_id(RecordCategory::AdminAction, created));
//! ```

use crate::error::{Result, VaultError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Catalog identifier of an archive.
pub type ArchiveId = String;

/// Catalog identifier of a legal hold.
pub type HoldId = String;

/// Category of audit records held by an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordCategory {
    EncryptionEvent,
    SecurityEvent,
    AdminAction,
    SystemEvent,
    ComplianceEvent,
}

impl RecordCategory {
    /// Every category, in catalog order.
    pub const ALL: [RecordCategory; 5] = [
        RecordCategory::EncryptionEvent,
        RecordCategory::SecurityEvent,
        RecordCategory::AdminAction,
        RecordCategory::SystemEvent,
        RecordCategory::ComplianceEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::EncryptionEvent => "encryption-event",
            RecordCategory::SecurityEvent => "security-event",
            RecordCategory::AdminAction => "admin-action",
            RecordCategory::SystemEvent => "system-event",
            RecordCategory::ComplianceEvent => "compliance-event",
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordCategory {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        RecordCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| VaultError::InvalidArgument(format!("unknown record category: {}", s)))
    }
}

/// Lifecycle state of an archive.
///
/// `Archived` is reserved for cold-storage tiering; nothing in this crate
/// transitions into it, but catalogs may contain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionStatus {
    Active,
    Archived,
    LegalHold,
    Expired,
    Purged,
}

impl RetentionStatus {
    pub const ALL: [RetentionStatus; 5] = [
        RetentionStatus::Active,
        RetentionStatus::Archived,
        RetentionStatus::LegalHold,
        RetentionStatus::Expired,
        RetentionStatus::Purged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionStatus::Active => "ACTIVE",
            RetentionStatus::Archived => "ARCHIVED",
            RetentionStatus::LegalHold => "LEGAL_HOLD",
            RetentionStatus::Expired => "EXPIRED",
            RetentionStatus::Purged => "PURGED",
        }
    }
}

impl fmt::Display for RetentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        RetentionStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| VaultError::InvalidArgument(format!("unknown retention status: {}", s)))
    }
}

/// Catalog row for one stored archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditArchive {
    pub archive_id: ArchiveId,
    pub category: RecordCategory,
    pub creation_date: DateTime<Utc>,
    /// Earliest source event contained in the archive.
    pub start_date: DateTime<Utc>,
    /// Latest source event contained in the archive.
    pub end_date: DateTime<Utc>,
    pub record_count: u64,
    /// Size of the original payload.
    pub payload_size: u64,
    /// Size of the payload after compression, before encryption.
    pub compressed_size: u64,
    /// Hex HMAC-SHA256 over the encrypted bytes, bound to id and category.
    pub integrity_digest: String,
    /// Opaque reference into the key vault.
    pub encryption_key_id: String,
    pub retention_status: RetentionStatus,
    /// Set exactly while `retention_status` is `LegalHold`.
    pub legal_hold_id: Option<HoldId>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub last_verified: Option<DateTime<Utc>>,
    pub purged_at: Option<DateTime<Utc>>,
    pub purged_by: Option<String>,
}

impl AuditArchive {
    /// Whether the encrypted payload is still expected on disk.
    pub fn has_payload(&self) -> bool {
        self.retention_status != RetentionStatus::Purged
    }
}

/// Legal hold status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    Active,
    Released,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "ACTIVE",
            HoldStatus::Released => "RELEASED",
        }
    }
}

impl FromStr for HoldStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(HoldStatus::Active),
            "RELEASED" => Ok(HoldStatus::Released),
            _ => Err(VaultError::InvalidArgument(format!("unknown hold status: {}", s))),
        }
    }
}

/// A legal hold over one or more archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalHold {
    pub hold_id: HoldId,
    /// Case number or matter reference.
    pub case_reference: String,
    pub hold_date: DateTime<Utc>,
    pub requesting_attorney: String,
    pub scope_description: String,
    pub affected_archive_ids: Vec<ArchiveId>,
    pub status: HoldStatus,
    pub release_date: Option<DateTime<Utc>>,
    pub released_by: Option<String>,
}

impl LegalHold {
    pub fn is_active(&self) -> bool {
        self.status == HoldStatus::Active
    }
}

/// Builds a fresh archive id for `category` created at `created`.
pub fn new_archive_id(category: RecordCategory, created: DateTime<Utc>) -> ArchiveId {
    let disambiguator = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        category.as_str(),
        created.format("%Y%m%dT%H%M%SZ"),
        &disambiguator[..12]
    )
}

/// Builds a fresh legal hold id.
pub fn new_hold_id() -> HoldId {
    format!("hold-{}", Uuid::new_v4())
}

/// Catalog timestamp encoding (milliseconds since the Unix epoch).
pub(crate) fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| VaultError::Serialization(format!("timestamp out of range: {}", ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_round_trip() {
        for category in RecordCategory::ALL {
            assert_eq!(category.as_str().parse::<RecordCategory>().unwrap(), category);
        }
        assert_eq!(
            "ADMIN_ACTION".parse::<RecordCategory>().unwrap(),
            RecordCategory::AdminAction
        );
        assert!("billing".parse::<RecordCategory>().is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "legal-hold".parse::<RetentionStatus>().unwrap(),
            RetentionStatus::LegalHold
        );
    }

    #[test]
    fn test_category_serde_uses_kebab_case() {
        let json = serde_json::to_string(&RecordCategory::SecurityEvent).unwrap();
        assert_eq!(json, "\"security-event\"");
        let json = serde_json::to_string(&RetentionStatus::LegalHold).unwrap();
        assert_eq!(json, "\"LEGAL_HOLD\"");
    }

    #[test]
    fn test_archive_ids_are_unique_within_a_second() {
        let now = Utc::now();
        let ids: std::collections::HashSet<_> = (0..100)
            .map(|_| new_archive_id(RecordCategory::SecurityEvent, now))
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_millis_round_trip() {
        let t = Utc.with_ymd_and_hms(2031, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(from_millis(to_millis(t)).unwrap(), t);
    }
}
