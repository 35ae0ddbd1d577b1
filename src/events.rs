//! Event notification for the monitoring collaborator.
//!
//! Every lifecycle transition is published on a broadcast channel.
//! [`RetentionEvent::IntegrityViolation`] is the one subscribers must treat
//! as a critical alert.

use crate::reconcile::ReconcileReport;
use crate::types::{ArchiveId, HoldId, RecordCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events published by the retention subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetentionEvent {
    ArchiveCreated {
        archive_id: ArchiveId,
        category: RecordCategory,
        expiration_date: DateTime<Utc>,
    },
    ArchiveExpired {
        archive_id: ArchiveId,
    },
    IntegrityVerified {
        archive_id: ArchiveId,
    },
    /// Stored ciphertext no longer matches its digest.
    IntegrityViolation {
        archive_id: ArchiveId,
        detected_at: DateTime<Utc>,
    },
    HoldPlaced {
        hold_id: HoldId,
        archive_ids: Vec<ArchiveId>,
    },
    HoldReleased {
        hold_id: HoldId,
        reactivated: Vec<ArchiveId>,
        expired: Vec<ArchiveId>,
    },
    ArchivePurged {
        archive_id: ArchiveId,
        approved_by: String,
    },
    ReconcileCompleted {
        report: ReconcileReport,
    },
    ReconcileStepFailed {
        step: String,
        error: String,
    },
}

impl RetentionEvent {
    /// Whether monitoring should page on this event.
    pub fn is_critical(&self) -> bool {
        matches!(self, RetentionEvent::IntegrityViolation { .. })
    }
}

/// Broadcast bus for [`RetentionEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RetentionEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: RetentionEvent) {
        trace!(event = ?event, "Publishing retention event");
        self.published.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Subscribe to subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<RetentionEvent> {
        self.sender.subscribe()
    }

    /// Number of events published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
