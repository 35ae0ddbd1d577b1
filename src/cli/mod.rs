//! Command-line interface for AuditVault.

use crate::types::{RecordCategory, RetentionStatus};
use crate::retention::OperationKind;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AuditVault - tamper-evident retention for audit records.
#[derive(Parser)]
#[command(name = "auditvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AUDITVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "AUDITVAULT_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the reconciliation service until interrupted
    Serve,

    /// Run a single reconciliation tick and print its report
    Reconcile,

    /// Show retention status counts and archives expiring soon
    Status,

    /// Archive operations
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },

    /// Legal hold operations
    Hold {
        #[command(subcommand)]
        command: HoldCommands,
    },

    /// Retention policy operations
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// Query the operational log
    Log {
        /// Only entries of this kind (repeatable)
        #[arg(short, long)]
        kind: Vec<OperationKind>,

        /// Only entries for this archive
        #[arg(long)]
        archive: Option<String>,

        /// Only entries for this hold
        #[arg(long)]
        hold: Option<String>,

        /// Only entries at or after this time (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Maximum entries, newest first
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
}

/// Archive subcommands.
#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// Archive a file of audit records
    Create {
        /// Record category (e.g. security-event)
        #[arg(short, long)]
        category: RecordCategory,

        /// Earliest event in the file (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Latest event in the file (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Payload file
        file: PathBuf,

        /// Record count; defaults to the number of non-blank lines
        #[arg(long)]
        record_count: Option<u64>,

        /// Producer recorded in the operational log
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Show an archive's catalog row
    Show {
        archive_id: String,
    },

    /// List archives
    List {
        #[arg(short, long)]
        status: Option<RetentionStatus>,

        #[arg(short, long)]
        category: Option<RecordCategory>,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Re-verify an archive's integrity digest
    Verify {
        archive_id: String,
    },

    /// Decrypt an archive's payload after verifying it
    Export {
        archive_id: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Purge an expired archive
    Purge {
        archive_id: String,

        /// Person approving the purge
        #[arg(long)]
        approved_by: String,

        /// Reason recorded with the purge
        #[arg(long, default_value = "retention period elapsed")]
        reason: String,

        /// Only report whether the archive is eligible
        #[arg(long)]
        dry_run: bool,
    },
}

/// Legal hold subcommands.
#[derive(Subcommand)]
pub enum HoldCommands {
    /// Place a hold on one or more archives
    Place {
        /// Case number or matter reference
        #[arg(long)]
        case: String,

        #[arg(long)]
        attorney: String,

        #[arg(long, default_value = "")]
        scope: String,

        /// Archives to hold
        #[arg(required = true)]
        archive_ids: Vec<String>,
    },

    /// Release an active hold
    Release {
        hold_id: String,

        #[arg(long)]
        attorney: String,
    },

    /// Show a hold
    Show {
        hold_id: String,
    },

    /// List holds
    List {
        /// Only active holds
        #[arg(long)]
        active: bool,
    },
}

/// Policy subcommands.
#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Show the policy in force for every category
    List,

    /// Override a category's policy
    Set {
        #[arg(short, long)]
        category: RecordCategory,

        /// Retention in years (at least 7)
        #[arg(long)]
        years: u32,

        #[arg(long)]
        archive_after_days: u32,

        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        legal_hold_capable: bool,

        #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
        purge_approved: bool,

        /// Person approving the override
        #[arg(long)]
        approved_by: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
