// Archive retention
//
// Lifecycle management for tamper-evident audit archives:
// - Retention policies with a statutory 7-year floor
// - Archive creation, integrity verification, expiration and approved purge
// - Legal holds that suspend expiration
// - Operational log of the subsystem's own actions

pub mod legal_hold;
pub mod lifecycle;
pub mod oplog;
pub mod policy;

pub use legal_hold::LegalHoldManager;
pub use lifecycle::{
    ArchiveManager, ArchiveRequest, ExpiringArchive, PurgeApproval, PurgeEligibility,
    RetentionStatusReport,
};
pub use oplog::{OperationKind, OperationQuery, OperationRecord};
pub use policy::{
    PolicyRegistry, PolicyUpdate, RetentionPolicy, MAX_RETENTION_YEARS, MIN_RETENTION_YEARS,
};

/// Actor recorded for operations performed by the background loop.
pub const SYSTEM_ACTOR: &str = "system";
