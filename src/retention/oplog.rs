// Operational log of the retention subsystem itself

use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    // Archive lifecycle
    ArchiveCreated,
    ArchiveExpired,
    ArchivePurged,

    // Integrity
    IntegrityVerified,
    IntegrityViolation,

    // Legal holds
    HoldPlaced,
    HoldReleased,

    // Administration
    PolicyOverridden,

    // Background
    ReconcileTick,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::ArchiveCreated,
        OperationKind::ArchiveExpired,
        OperationKind::ArchivePurged,
        OperationKind::IntegrityVerified,
        OperationKind::IntegrityViolation,
        OperationKind::HoldPlaced,
        OperationKind::HoldReleased,
        OperationKind::PolicyOverridden,
        OperationKind::ReconcileTick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ArchiveCreated => "archive_created",
            OperationKind::ArchiveExpired => "archive_expired",
            OperationKind::ArchivePurged => "archive_purged",
            OperationKind::IntegrityVerified => "integrity_verified",
            OperationKind::IntegrityViolation => "integrity_violation",
            OperationKind::HoldPlaced => "hold_placed",
            OperationKind::HoldReleased => "hold_released",
            OperationKind::PolicyOverridden => "policy_overridden",
            OperationKind::ReconcileTick => "reconcile_tick",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        OperationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| VaultError::InvalidArgument(format!("unknown operation kind: {}", s)))
    }
}

/// One entry of the operational log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Sequence number assigned by the catalog (0 until stored)
    pub seq: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: OperationKind,
    /// Who performed the operation ("system" for background work)
    pub actor: String,
    pub archive_id: Option<String>,
    pub hold_id: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
}

impl OperationRecord {
    /// Creates a new entry
    pub fn new(kind: OperationKind, actor: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            seq: 0,
            timestamp,
            kind,
            actor: actor.into(),
            archive_id: None,
            hold_id: None,
            success: true,
            detail: None,
        }
    }

    /// Sets archive
    pub fn with_archive(mut self, archive_id: impl Into<String>) -> Self {
        self.archive_id = Some(archive_id.into());
        self
    }

    /// Sets hold
    pub fn with_hold(mut self, hold_id: impl Into<String>) -> Self {
        self.hold_id = Some(hold_id.into());
        self
    }

    /// Sets detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Marks as failed
    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.success = false;
        self.detail = Some(detail.into());
        self
    }
}

/// Operational log query filters
#[derive(Debug, Clone, Default)]
pub struct OperationQuery {
    pub kinds: Option<Vec<OperationKind>>,
    pub archive_id: Option<String>,
    pub hold_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl OperationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: Vec<OperationKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn archive(mut self, archive_id: impl Into<String>) -> Self {
        self.archive_id = Some(archive_id.into());
        self
    }

    pub fn hold(mut self, hold_id: impl Into<String>) -> Self {
        self.hold_id = Some(hold_id.into());
        self
    }

    pub fn time_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
