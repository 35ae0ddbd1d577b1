//! SQLite catalog.
//!
//! The catalog is the single source of truth for archive status, legal holds,
//! policy overrides and the operational log. One connection sits behind a
//! mutex, so there is exactly one writer; multi-row changes go through
//! [`Catalog::write`], which runs the closure inside an `IMMEDIATE`
//! transaction and rolls back on any error.
//!
//! The schema enforces the lifecycle rules independently of the code:
//!
//! - `legal_hold_id` is set if and only if the status is `LEGAL_HOLD`
//! - a `PURGED` archive never changes status again
//! - archive rows are never deleted

use crate::error::{Result, VaultError};
use crate::retention::oplog::{OperationKind, OperationQuery, OperationRecord};
use crate::retention::policy::RetentionPolicy;
use crate::types::{
    from_millis, to_millis, AuditArchive, HoldStatus, LegalHold, RecordCategory, RetentionStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS archives (
    archive_id        TEXT PRIMARY KEY,
    category          TEXT NOT NULL,
    creation_date     INTEGER NOT NULL,
    start_date        INTEGER NOT NULL,
    end_date          INTEGER NOT NULL,
    record_count      INTEGER NOT NULL,
    payload_size      INTEGER NOT NULL,
    compressed_size   INTEGER NOT NULL,
    integrity_digest  TEXT NOT NULL,
    encryption_key_id TEXT NOT NULL,
    retention_status  TEXT NOT NULL
        CHECK (retention_status IN ('ACTIVE', 'ARCHIVED', 'LEGAL_HOLD', 'EXPIRED', 'PURGED')),
    legal_hold_id     TEXT,
    expiration_date   INTEGER,
    last_verified     INTEGER,
    purged_at         INTEGER,
    purged_by         TEXT,
    CHECK ((legal_hold_id IS NOT NULL) = (retention_status = 'LEGAL_HOLD')),
    CHECK (start_date <= end_date)
);

CREATE INDEX IF NOT EXISTS idx_archives_status ON archives(retention_status);
CREATE INDEX IF NOT EXISTS idx_archives_expiration ON archives(expiration_date);

CREATE TRIGGER IF NOT EXISTS archives_purged_is_terminal
BEFORE UPDATE OF retention_status ON archives
WHEN OLD.retention_status = 'PURGED' AND NEW.retention_status <> 'PURGED'
BEGIN
    SELECT RAISE(ABORT, 'purged archives cannot change status');
END;

CREATE TRIGGER IF NOT EXISTS archives_never_deleted
BEFORE DELETE ON archives
BEGIN
    SELECT RAISE(ABORT, 'archive rows are never deleted');
END;

CREATE TABLE IF NOT EXISTS legal_holds (
    hold_id             TEXT PRIMARY KEY,
    case_reference      TEXT NOT NULL,
    hold_date           INTEGER NOT NULL,
    requesting_attorney TEXT NOT NULL,
    scope_description   TEXT NOT NULL,
    status              TEXT NOT NULL CHECK (status IN ('ACTIVE', 'RELEASED')),
    release_date        INTEGER,
    released_by         TEXT
);

CREATE TABLE IF NOT EXISTS legal_hold_archives (
    hold_id    TEXT NOT NULL REFERENCES legal_holds(hold_id),
    archive_id TEXT NOT NULL REFERENCES archives(archive_id),
    PRIMARY KEY (hold_id, archive_id)
);

CREATE INDEX IF NOT EXISTS idx_hold_archives_archive ON legal_hold_archives(archive_id);

CREATE TABLE IF NOT EXISTS policies (
    category           TEXT PRIMARY KEY,
    retention_years    INTEGER NOT NULL CHECK (retention_years BETWEEN 7 AND 100),
    archive_after_days INTEGER NOT NULL,
    legal_hold_capable INTEGER NOT NULL,
    purge_approved     INTEGER NOT NULL,
    updated_at         INTEGER NOT NULL,
    updated_by         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS operation_log (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp  INTEGER NOT NULL,
    kind       TEXT NOT NULL,
    actor      TEXT NOT NULL,
    archive_id TEXT,
    hold_id    TEXT,
    success    INTEGER NOT NULL,
    detail     TEXT
);

CREATE INDEX IF NOT EXISTS idx_oplog_timestamp ON operation_log(timestamp);
"#;

const ARCHIVE_COLUMNS: &str = "archive_id, category, creation_date, start_date, end_date, \
     record_count, payload_size, compressed_size, integrity_digest, encryption_key_id, \
     retention_status, legal_hold_id, expiration_date, last_verified, purged_at, purged_by";

/// Archive listing filters.
#[derive(Debug, Clone, Default)]
pub struct ArchiveQuery {
    pub status: Option<RetentionStatus>,
    pub category: Option<RecordCategory>,
    pub limit: Option<usize>,
}

impl ArchiveQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: RetentionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: RecordCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Relational catalog of archives, holds, policies and operations.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open (or create) the catalog file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::init(conn)
    }

    /// In-memory catalog, for tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        debug!("Catalog schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run read-only queries against the catalog.
    pub fn read<T>(&self, f: impl FnOnce(&CatalogTx<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&CatalogTx { conn: &conn })
    }

    /// Run `f` inside one immediate transaction, committing only on success.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&CatalogTx<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&CatalogTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    /// Look up one archive.
    pub fn get_archive(&self, archive_id: &str) -> Result<Option<AuditArchive>> {
        self.read(|tx| tx.get_archive(archive_id))
    }

    /// List archives matching `query`.
    pub fn list_archives(&self, query: &ArchiveQuery) -> Result<Vec<AuditArchive>> {
        self.read(|tx| tx.list_archives(query))
    }

    /// Look up one legal hold.
    pub fn get_hold(&self, hold_id: &str) -> Result<Option<LegalHold>> {
        self.read(|tx| tx.get_hold(hold_id))
    }

    /// Query the operational log.
    pub fn query_operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>> {
        self.read(|tx| tx.query_operations(query))
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

/// Typed access to the catalog within one lock acquisition or transaction.
pub struct CatalogTx<'c> {
    conn: &'c Connection,
}

impl CatalogTx<'_> {
    // Archives

    pub fn get_archive(&self, archive_id: &str) -> Result<Option<AuditArchive>> {
        let sql = format!("SELECT {} FROM archives WHERE archive_id = ?1", ARCHIVE_COLUMNS);
        self.conn
            .query_row(&sql, params![archive_id], ArchiveRow::from_row)
            .optional()?
            .map(ArchiveRow::into_archive)
            .transpose()
    }

    pub fn list_archives(&self, query: &ArchiveQuery) -> Result<Vec<AuditArchive>> {
        let sql = format!(
            "SELECT {} FROM archives \
             WHERE (?1 IS NULL OR retention_status = ?1) AND (?2 IS NULL OR category = ?2) \
             ORDER BY creation_date, archive_id LIMIT ?3",
            ARCHIVE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                query.status.map(|s| s.as_str()),
                query.category.map(|c| c.as_str()),
                limit_param(query.limit),
            ],
            ArchiveRow::from_row,
        )?;

        let mut archives = Vec::new();
        for row in rows {
            archives.push(row?.into_archive()?);
        }
        Ok(archives)
    }

    /// Up to `limit` ids drawn at random from archives in `status`.
    pub fn sample_ids_with_status(
        &self,
        status: RetentionStatus,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT archive_id FROM archives WHERE retention_status = ?1 \
             ORDER BY RANDOM() LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![status.as_str(), limit_param(Some(limit))], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Counts for every status, zeros included.
    pub fn status_counts(&self) -> Result<Vec<(RetentionStatus, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT retention_status, COUNT(*) FROM archives GROUP BY retention_status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts: Vec<(RetentionStatus, u64)> =
            RetentionStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (status, count) in rows {
            let status: RetentionStatus = status.parse()?;
            if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == status) {
                entry.1 = from_i64(count);
            }
        }
        Ok(counts)
    }

    /// Bytes of ciphertext still expected on disk.
    pub fn stored_bytes(&self) -> Result<u64> {
        let total: Option<i64> = self.conn.query_row(
            "SELECT SUM(compressed_size) FROM archives WHERE retention_status <> 'PURGED'",
            [],
            |row| row.get(0),
        )?;
        Ok(from_i64(total.unwrap_or(0)))
    }

    /// ACTIVE archives whose expiration falls in `(now, until]`.
    pub fn expiring_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<AuditArchive>> {
        let sql = format!(
            "SELECT {} FROM archives \
             WHERE retention_status = 'ACTIVE' AND expiration_date > ?1 AND expiration_date <= ?2 \
             ORDER BY expiration_date, archive_id",
            ARCHIVE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_millis(now), to_millis(until)], ArchiveRow::from_row)?;

        let mut archives = Vec::new();
        for row in rows {
            archives.push(row?.into_archive()?);
        }
        Ok(archives)
    }

    pub(crate) fn insert_archive(&self, a: &AuditArchive) -> Result<()> {
        let sql = format!(
            "INSERT INTO archives ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            ARCHIVE_COLUMNS
        );
        let result = self.conn.execute(
            &sql,
            params![
                a.archive_id,
                a.category.as_str(),
                to_millis(a.creation_date),
                to_millis(a.start_date),
                to_millis(a.end_date),
                to_i64(a.record_count),
                to_i64(a.payload_size),
                to_i64(a.compressed_size),
                a.integrity_digest,
                a.encryption_key_id,
                a.retention_status.as_str(),
                a.legal_hold_id,
                a.expiration_date.map(to_millis),
                a.last_verified.map(to_millis),
                a.purged_at.map(to_millis),
                a.purged_by,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(VaultError::Conflict(format!(
                    "archive {} already exists",
                    a.archive_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Conditional status change. Returns false if the archive was not in
    /// `from`.
    pub(crate) fn transition(
        &self,
        archive_id: &str,
        from: RetentionStatus,
        to: RetentionStatus,
        legal_hold_id: Option<&str>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE archives SET retention_status = ?1, legal_hold_id = ?2 \
             WHERE archive_id = ?3 AND retention_status = ?4",
            params![to.as_str(), legal_hold_id, archive_id, from.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// Moves every due ACTIVE archive to EXPIRED and returns their ids.
    pub(crate) fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "UPDATE archives SET retention_status = 'EXPIRED' \
             WHERE retention_status = 'ACTIVE' AND expiration_date IS NOT NULL \
               AND expiration_date <= ?1 \
             RETURNING archive_id",
        )?;
        let ids = stmt
            .query_map(params![to_millis(now)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub(crate) fn touch_verified(&self, archive_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE archives SET last_verified = ?1 WHERE archive_id = ?2",
            params![to_millis(at), archive_id],
        )?;
        Ok(())
    }

    /// EXPIRED to PURGED, recording who approved it.
    pub(crate) fn mark_purged(&self, archive_id: &str, at: DateTime<Utc>, by: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE archives SET retention_status = 'PURGED', purged_at = ?1, purged_by = ?2 \
             WHERE archive_id = ?3 AND retention_status = 'EXPIRED'",
            params![to_millis(at), by, archive_id],
        )?;
        Ok(changed == 1)
    }

    // Legal holds

    pub fn get_hold(&self, hold_id: &str) -> Result<Option<LegalHold>> {
        let row = self
            .conn
            .query_row(
                "SELECT hold_id, case_reference, hold_date, requesting_attorney, scope_description, \
                 status, release_date, released_by FROM legal_holds WHERE hold_id = ?1",
                params![hold_id],
                HoldRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let archive_ids = self.hold_archive_ids(hold_id)?;
                Ok(Some(row.into_hold(archive_ids)?))
            }
            None => Ok(None),
        }
    }

    pub fn list_holds(&self, active_only: bool) -> Result<Vec<LegalHold>> {
        let mut stmt = self.conn.prepare(
            "SELECT hold_id, case_reference, hold_date, requesting_attorney, scope_description, \
             status, release_date, released_by FROM legal_holds \
             WHERE (?1 = 0 OR status = 'ACTIVE') ORDER BY hold_date, hold_id",
        )?;
        let rows = stmt
            .query_map(params![active_only], HoldRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut holds = Vec::with_capacity(rows.len());
        for row in rows {
            let archive_ids = self.hold_archive_ids(&row.hold_id)?;
            holds.push(row.into_hold(archive_ids)?);
        }
        Ok(holds)
    }

    pub fn active_hold_count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM legal_holds WHERE status = 'ACTIVE'",
            [],
            |row| row.get(0),
        )?;
        Ok(from_i64(count))
    }

    fn hold_archive_ids(&self, hold_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT archive_id FROM legal_hold_archives WHERE hold_id = ?1 ORDER BY rowid")?;
        let ids = stmt
            .query_map(params![hold_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub(crate) fn insert_hold(&self, hold: &LegalHold) -> Result<()> {
        self.conn.execute(
            "INSERT INTO legal_holds (hold_id, case_reference, hold_date, requesting_attorney, \
             scope_description, status, release_date, released_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                hold.hold_id,
                hold.case_reference,
                to_millis(hold.hold_date),
                hold.requesting_attorney,
                hold.scope_description,
                hold.status.as_str(),
                hold.release_date.map(to_millis),
                hold.released_by,
            ],
        )?;

        let mut stmt = self
            .conn
            .prepare("INSERT INTO legal_hold_archives (hold_id, archive_id) VALUES (?1, ?2)")?;
        for archive_id in &hold.affected_archive_ids {
            stmt.execute(params![hold.hold_id, archive_id])?;
        }
        Ok(())
    }

    /// ACTIVE to RELEASED. Returns false if the hold was not active.
    pub(crate) fn release_hold(&self, hold_id: &str, at: DateTime<Utc>, by: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE legal_holds SET status = 'RELEASED', release_date = ?1, released_by = ?2 \
             WHERE hold_id = ?3 AND status = 'ACTIVE'",
            params![to_millis(at), by, hold_id],
        )?;
        Ok(changed == 1)
    }

    // Policies

    pub fn load_policies(&self) -> Result<Vec<RetentionPolicy>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, retention_years, archive_after_days, legal_hold_capable, \
             purge_approved FROM policies ORDER BY category",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(category, years, after, hold, purge)| {
                Ok(RetentionPolicy::new(category.parse()?, years, after, hold, purge))
            })
            .collect()
    }

    pub(crate) fn upsert_policy(
        &self,
        policy: &RetentionPolicy,
        at: DateTime<Utc>,
        by: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO policies (category, retention_years, archive_after_days, \
             legal_hold_capable, purge_approved, updated_at, updated_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(category) DO UPDATE SET \
               retention_years = excluded.retention_years, \
               archive_after_days = excluded.archive_after_days, \
               legal_hold_capable = excluded.legal_hold_capable, \
               purge_approved = excluded.purge_approved, \
               updated_at = excluded.updated_at, \
               updated_by = excluded.updated_by",
            params![
                policy.category.as_str(),
                policy.retention_years,
                policy.archive_after_days,
                policy.legal_hold_capable,
                policy.purge_approved,
                to_millis(at),
                by,
            ],
        )?;
        Ok(())
    }

    // Operational log

    pub(crate) fn append_operation(&self, record: &OperationRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO operation_log (timestamp, kind, actor, archive_id, hold_id, success, detail) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_millis(record.timestamp),
                record.kind.as_str(),
                record.actor,
                record.archive_id,
                record.hold_id,
                record.success,
                record.detail,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn query_operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>> {
        let mut sql = String::from(
            "SELECT seq, timestamp, kind, actor, archive_id, hold_id, success, detail \
             FROM operation_log WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(kinds) = &query.kinds {
            if kinds.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; kinds.len()].join(", ");
            sql.push_str(&format!(" AND kind IN ({})", placeholders));
            values.extend(kinds.iter().map(|k| Value::Text(k.as_str().to_string())));
        }
        if let Some(archive_id) = &query.archive_id {
            sql.push_str(" AND archive_id = ?");
            values.push(Value::Text(archive_id.clone()));
        }
        if let Some(hold_id) = &query.hold_id {
            sql.push_str(" AND hold_id = ?");
            values.push(Value::Text(hold_id.clone()));
        }
        if let Some(from) = query.from {
            sql.push_str(" AND timestamp >= ?");
            values.push(Value::Integer(to_millis(from)));
        }
        if let Some(to) = query.to {
            sql.push_str(" AND timestamp <= ?");
            values.push(Value::Integer(to_millis(to)));
        }
        sql.push_str(" ORDER BY seq DESC LIMIT ?");
        values.push(Value::Integer(limit_param(query.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(seq, ts, kind, actor, archive_id, hold_id, success, detail)| {
                Ok(OperationRecord {
                    seq,
                    timestamp: from_millis(ts)?,
                    kind: kind.parse::<OperationKind>()?,
                    actor,
                    archive_id,
                    hold_id,
                    success,
                    detail,
                })
            })
            .collect()
    }

    /// Delete operational log entries older than `cutoff`.
    pub(crate) fn prune_operations(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM operation_log WHERE timestamp < ?1",
            params![to_millis(cutoff)],
        )?;
        Ok(removed)
    }
}

struct ArchiveRow {
    archive_id: String,
    category: String,
    creation_date: i64,
    start_date: i64,
    end_date: i64,
    record_count: i64,
    payload_size: i64,
    compressed_size: i64,
    integrity_digest: String,
    encryption_key_id: String,
    retention_status: String,
    legal_hold_id: Option<String>,
    expiration_date: Option<i64>,
    last_verified: Option<i64>,
    purged_at: Option<i64>,
    purged_by: Option<String>,
}

impl ArchiveRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            archive_id: row.get(0)?,
            category: row.get(1)?,
            creation_date: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            record_count: row.get(5)?,
            payload_size: row.get(6)?,
            compressed_size: row.get(7)?,
            integrity_digest: row.get(8)?,
            encryption_key_id: row.get(9)?,
            retention_status: row.get(10)?,
            legal_hold_id: row.get(11)?,
            expiration_date: row.get(12)?,
            last_verified: row.get(13)?,
            purged_at: row.get(14)?,
            purged_by: row.get(15)?,
        })
    }

    fn into_archive(self) -> Result<AuditArchive> {
        Ok(AuditArchive {
            archive_id: self.archive_id,
            category: self.category.parse()?,
            creation_date: from_millis(self.creation_date)?,
            start_date: from_millis(self.start_date)?,
            end_date: from_millis(self.end_date)?,
            record_count: from_i64(self.record_count),
            payload_size: from_i64(self.payload_size),
            compressed_size: from_i64(self.compressed_size),
            integrity_digest: self.integrity_digest,
            encryption_key_id: self.encryption_key_id,
            retention_status: self.retention_status.parse()?,
            legal_hold_id: self.legal_hold_id,
            expiration_date: self.expiration_date.map(from_millis).transpose()?,
            last_verified: self.last_verified.map(from_millis).transpose()?,
            purged_at: self.purged_at.map(from_millis).transpose()?,
            purged_by: self.purged_by,
        })
    }
}

struct HoldRow {
    hold_id: String,
    case_reference: String,
    hold_date: i64,
    requesting_attorney: String,
    scope_description: String,
    status: String,
    release_date: Option<i64>,
    released_by: Option<String>,
}

impl HoldRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hold_id: row.get(0)?,
            case_reference: row.get(1)?,
            hold_date: row.get(2)?,
            requesting_attorney: row.get(3)?,
            scope_description: row.get(4)?,
            status: row.get(5)?,
            release_date: row.get(6)?,
            released_by: row.get(7)?,
        })
    }

    fn into_hold(self, affected_archive_ids: Vec<String>) -> Result<LegalHold> {
        Ok(LegalHold {
            hold_id: self.hold_id,
            case_reference: self.case_reference,
            hold_date: from_millis(self.hold_date)?,
            requesting_attorney: self.requesting_attorney,
            scope_description: self.scope_description,
            affected_archive_ids,
            status: self.status.parse::<HoldStatus>()?,
            release_date: self.release_date.map(from_millis).transpose()?,
            released_by: self.released_by,
        })
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn from_i64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn limit_param(limit: Option<usize>) -> i64 {
    limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1)
}
