//! Retention lifecycle integration tests
//!
//! Exercises the full stack (catalog, key vault, blob store, managers and
//! reconciler) on a temporary directory with a manual clock.

#[allow(dead_code)]
mod common;

use auditvault::catalog::ArchiveQuery;
use auditvault::events::RetentionEvent;
use auditvault::retention::{
    ArchiveRequest, OperationKind, OperationQuery, PolicyUpdate, PurgeApproval, MIN_RETENTION_YEARS,
};
use auditvault::shutdown::ShutdownCoordinator;
use auditvault::{HoldStatus, RecordCategory, RetentionStatus, VaultError};
use chrono::Duration;
use common::{AuditPayloadGenerator, TestEnv};

fn approve_purge(env: &TestEnv, category: RecordCategory) {
    let current = env
        .archives()
        .policies()
        .into_iter()
        .find(|p| p.category == category)
        .unwrap();
    let mut update = PolicyUpdate::from(&current);
    update.purge_approved = true;
    env.archives()
        .override_policy(category, update, "records-officer")
        .unwrap();
}

// =============================================================================
// Storage Round Trip
// =============================================================================

#[tokio::test]
async fn test_retrieve_returns_original_payload() {
    let env = TestEnv::new();
    let mut generator = AuditPayloadGenerator::new(7);
    let end = env.now();
    let start = end - Duration::days(30);

    let payloads = vec![
        Vec::new(),
        b"sample-audit-record".to_vec(),
        generator.jsonl(2_000, start, end),
        generator.random_bytes(256 * 1024),
    ];

    for payload in payloads {
        let archive_id = env
            .archives()
            .create_archive(RecordCategory::SecurityEvent, start, end, payload.clone())
            .await
            .unwrap();

        let retrieved = env.archives().retrieve_archive(&archive_id).await.unwrap();
        assert_eq!(retrieved, payload);

        let archive = env.archives().get_archive(&archive_id).unwrap();
        assert_eq!(archive.payload_size, payload.len() as u64);
        assert_eq!(archive.retention_status, RetentionStatus::Active);
    }
}

#[tokio::test]
async fn test_key_material_is_separate_and_private() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::EncryptionEvent, 10).await;

    assert!(env.blob_path(&archive_id).exists());
    assert!(env.key_path(&archive_id).exists());
    assert!(!env.key_path(&archive_id).starts_with(&env.config.storage.blob_dir));

    let blob_entries: Vec<_> = std::fs::read_dir(&env.config.storage.blob_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(blob_entries.iter().all(|name| name.ends_with(".enc")));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(env.key_path(&archive_id))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_record_count_and_compression_accounting() {
    let env = TestEnv::new();
    let end = env.now();
    let start = end - Duration::days(1);
    let payload = AuditPayloadGenerator::default().jsonl(500, start, end);

    let archive_id = env
        .archives()
        .create(ArchiveRequest::new(RecordCategory::AdminAction, start, end, payload.clone()))
        .await
        .unwrap();
    let archive = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(archive.record_count, 500);
    assert!(archive.compressed_size < archive.payload_size);

    let explicit = env
        .archives()
        .create(
            ArchiveRequest::new(RecordCategory::AdminAction, start, end, payload)
                .with_record_count(3)
                .with_actor("admin-audit"),
        )
        .await
        .unwrap();
    assert_eq!(env.archives().get_archive(&explicit).unwrap().record_count, 3);

    let ops = env
        .system
        .query_operations(&OperationQuery::new().archive(explicit.as_str()))
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::ArchiveCreated);
    assert_eq!(ops[0].actor, "admin-audit");
}

#[tokio::test]
async fn test_concurrent_creation_yields_unique_ids() {
    let env = TestEnv::new();
    let end = env.now();
    let start = end - Duration::hours(1);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let archives = env.archives().clone();
        tasks.push(tokio::spawn(async move {
            archives
                .create_archive(
                    RecordCategory::SystemEvent,
                    start,
                    end,
                    format!("record-{}", i).into_bytes(),
                )
                .await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}

// =============================================================================
// Integrity
// =============================================================================

#[tokio::test]
async fn test_corrupted_ciphertext_fails_verification() {
    let env = TestEnv::new();
    let end = env.now();
    let archive_id = env
        .archives()
        .create_archive(
            RecordCategory::SecurityEvent,
            end - Duration::minutes(5),
            end,
            b"sample-audit-record".to_vec(),
        )
        .await
        .unwrap();

    assert!(env.archives().verify_archive_integrity(&archive_id).await.unwrap());
    let before = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(before.last_verified, Some(env.now()));

    let mut events = env.system.subscribe();
    env.advance_days(1);
    env.corrupt_blob(&archive_id, 20);

    assert!(!env.archives().verify_archive_integrity(&archive_id).await.unwrap());

    // The row is left exactly as it was for forensic inspection.
    let after = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(after, before);

    let event = events.recv().await.unwrap();
    assert!(event.is_critical());
    assert!(matches!(
        event,
        RetentionEvent::IntegrityViolation { archive_id: ref id, .. } if *id == archive_id
    ));

    let err = env.archives().retrieve_archive(&archive_id).await.unwrap_err();
    assert!(err.is_integrity_violation());

    let violations = env
        .system
        .query_operations(&OperationQuery::new().kinds(vec![OperationKind::IntegrityViolation]))
        .unwrap();
    assert!(!violations.is_empty());
    assert!(violations.iter().all(|op| !op.success));
}

#[tokio::test]
async fn test_every_region_of_the_ciphertext_is_covered() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::ComplianceEvent, 50).await;
    let original = std::fs::read(env.blob_path(&archive_id)).unwrap();

    // Nonce, body and tag.
    for offset in [0, 11, 12, original.len() / 2, original.len() - 1] {
        env.corrupt_blob(&archive_id, offset);
        assert!(
            !env.archives().verify_blocking(&archive_id).unwrap(),
            "flip at {} went undetected",
            offset
        );
        std::fs::write(env.blob_path(&archive_id), &original).unwrap();
    }

    assert!(env.archives().verify_blocking(&archive_id).unwrap());
}

#[tokio::test]
async fn test_missing_ciphertext_fails_verification() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::SystemEvent, 5).await;

    std::fs::remove_file(env.blob_path(&archive_id)).unwrap();

    assert!(!env.archives().verify_archive_integrity(&archive_id).await.unwrap());
    assert!(matches!(
        env.archives().retrieve_archive(&archive_id).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_swapped_ciphertexts_fail_verification() {
    let env = TestEnv::new();
    let a = env.create_archive(RecordCategory::SecurityEvent, 10).await;
    let b = env.create_archive(RecordCategory::SecurityEvent, 10).await;

    let blob_a = std::fs::read(env.blob_path(&a)).unwrap();
    let blob_b = std::fs::read(env.blob_path(&b)).unwrap();
    std::fs::write(env.blob_path(&a), &blob_b).unwrap();
    std::fs::write(env.blob_path(&b), &blob_a).unwrap();

    assert!(!env.archives().verify_blocking(&a).unwrap());
    assert!(!env.archives().verify_blocking(&b).unwrap());
}

// =============================================================================
// Expiration and Legal Holds
// =============================================================================

#[tokio::test]
async fn test_admin_action_expires_after_seven_years() {
    let env = TestEnv::new();
    let created = env.now();
    let archive_id = env
        .archives()
        .create_archive(
            RecordCategory::AdminAction,
            created,
            created + Duration::seconds(1),
            b"admin granted role".to_vec(),
        )
        .await
        .unwrap();

    // Nothing expires early.
    env.advance_years(MIN_RETENTION_YEARS - 1);
    assert!(env.archives().expire_due_archives(env.now()).await.unwrap().is_empty());

    env.advance_years(1);
    env.advance_days(1);
    let expired = env.archives().expire_due_archives(env.now()).await.unwrap();
    assert_eq!(expired, vec![archive_id.clone()]);

    let archive = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(archive.retention_status, RetentionStatus::Expired);

    // Idempotent.
    assert!(env.archives().expire_due_archives(env.now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_hold_on_same_archive_conflicts() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::SecurityEvent, 3).await;

    let first = env
        .holds()
        .place_legal_hold("CASE-100", "counsel-a", "incident", &[archive_id.clone()])
        .await
        .unwrap();

    let err = env
        .holds()
        .place_legal_hold("CASE-200", "counsel-b", "audit", &[archive_id.clone()])
        .await
        .unwrap_err();
    match err {
        VaultError::Conflict(msg) => {
            assert!(msg.contains(&archive_id));
            assert!(msg.contains(&first));
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    assert_eq!(env.holds().list_holds(true).unwrap().len(), 1);
}

#[tokio::test]
async fn test_held_archive_never_expires_and_catches_up_on_release() {
    let env = TestEnv::new();
    let held = env.create_archive(RecordCategory::SecurityEvent, 3).await;
    let free = env.create_archive(RecordCategory::SecurityEvent, 3).await;

    let hold_id = env
        .holds()
        .place_legal_hold("CASE-1", "counsel", "litigation", &[held.clone()])
        .await
        .unwrap();

    env.advance_years(12);
    let expired = env.archives().expire_due_archives(env.now()).await.unwrap();
    assert_eq!(expired, vec![free.clone()]);
    assert_eq!(
        env.archives().get_archive(&held).unwrap().retention_status,
        RetentionStatus::LegalHold
    );

    assert!(env.holds().release_legal_hold(&hold_id, "counsel").await.unwrap());
    let released = env.archives().get_archive(&held).unwrap();
    assert_eq!(released.retention_status, RetentionStatus::Expired);
    assert_eq!(released.legal_hold_id, None);

    let hold = env.holds().get_hold(&hold_id).unwrap();
    assert_eq!(hold.status, HoldStatus::Released);
    assert_eq!(hold.release_date, Some(env.now()));
}

#[tokio::test]
async fn test_release_before_expiration_reactivates() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::SecurityEvent, 3).await;

    let hold_id = env
        .holds()
        .place_legal_hold("CASE-1", "counsel", "", &[archive_id.clone()])
        .await
        .unwrap();
    env.advance_years(2);

    let mut events = env.system.subscribe();
    assert!(env.holds().release_legal_hold(&hold_id, "counsel").await.unwrap());
    assert_eq!(
        env.archives().get_archive(&archive_id).unwrap().retention_status,
        RetentionStatus::Active
    );

    match events.recv().await.unwrap() {
        RetentionEvent::HoldReleased {
            reactivated,
            expired,
            ..
        } => {
            assert_eq!(reactivated, vec![archive_id]);
            assert!(expired.is_empty());
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(!env.holds().release_legal_hold(&hold_id, "counsel").await.unwrap());
}

#[tokio::test]
async fn test_expired_archive_can_be_held_against_purge() {
    let env = TestEnv::new();
    approve_purge(&env, RecordCategory::SystemEvent);
    let archive_id = env.create_archive(RecordCategory::SystemEvent, 3).await;

    env.advance_years(8);
    env.archives().expire_due_archives(env.now()).await.unwrap();

    let hold_id = env
        .holds()
        .place_legal_hold("CASE-9", "counsel", "", &[archive_id.clone()])
        .await
        .unwrap();
    let approval = PurgeApproval {
        approved_by: "records-officer".to_string(),
        reason: "retention elapsed".to_string(),
    };
    assert!(matches!(
        env.archives().purge_archive(&archive_id, approval.clone()).await,
        Err(VaultError::PolicyViolation(_))
    ));

    env.holds().release_legal_hold(&hold_id, "counsel").await.unwrap();
    let purged = env.archives().purge_archive(&archive_id, approval).await.unwrap();
    assert_eq!(purged.retention_status, RetentionStatus::Purged);
}

// =============================================================================
// Purge
// =============================================================================

#[tokio::test]
async fn test_purge_requires_policy_approval() {
    let env = TestEnv::new();
    let archive_id = env.create_archive(RecordCategory::SecurityEvent, 3).await;
    env.advance_years(8);
    env.archives().expire_due_archives(env.now()).await.unwrap();

    let eligibility = env.archives().purge_eligibility(&archive_id).unwrap();
    assert!(!eligibility.eligible);
    assert!(eligibility.reason.is_some());

    let approval = PurgeApproval {
        approved_by: "records-officer".to_string(),
        reason: "retention elapsed".to_string(),
    };
    assert!(matches!(
        env.archives().purge_archive(&archive_id, approval).await,
        Err(VaultError::PolicyViolation(_))
    ));

    let archive = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(archive.retention_status, RetentionStatus::Expired);
    assert!(env.blob_path(&archive_id).exists());
}

#[tokio::test]
async fn test_purge_shreds_payload_and_keeps_row() {
    let env = TestEnv::new();
    approve_purge(&env, RecordCategory::SecurityEvent);
    let archive_id = env.create_archive(RecordCategory::SecurityEvent, 3).await;

    let approval = PurgeApproval {
        approved_by: "records-officer".to_string(),
        reason: "retention elapsed".to_string(),
    };

    // Still ACTIVE.
    assert!(matches!(
        env.archives().purge_archive(&archive_id, approval.clone()).await,
        Err(VaultError::PolicyViolation(_))
    ));

    env.advance_years(8);
    env.archives().expire_due_archives(env.now()).await.unwrap();

    // A named approver is mandatory.
    let anonymous = PurgeApproval {
        approved_by: "  ".to_string(),
        reason: String::new(),
    };
    assert!(matches!(
        env.archives().purge_archive(&archive_id, anonymous).await,
        Err(VaultError::PolicyViolation(_))
    ));

    assert!(env.archives().purge_eligibility(&archive_id).unwrap().eligible);
    let purged = env.archives().purge_archive(&archive_id, approval.clone()).await.unwrap();
    assert_eq!(purged.retention_status, RetentionStatus::Purged);
    assert_eq!(purged.purged_by.as_deref(), Some("records-officer"));
    assert_eq!(purged.purged_at, Some(env.now()));

    assert!(!env.blob_path(&archive_id).exists());
    assert!(!env.key_path(&archive_id).exists());

    assert!(matches!(
        env.archives().retrieve_archive(&archive_id).await,
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        env.archives().verify_archive_integrity(&archive_id).await,
        Err(VaultError::InvalidState(_))
    ));
    assert!(env.archives().purge_archive(&archive_id, approval).await.is_err());
    assert!(env
        .holds()
        .place_legal_hold("CASE-1", "counsel", "", &[archive_id.clone()])
        .await
        .is_err());
}

// =============================================================================
// Policies
// =============================================================================

#[tokio::test]
async fn test_policy_override_survives_restart() {
    let mut env = TestEnv::new();

    let below_floor = PolicyUpdate {
        retention_years: 3,
        archive_after_days: 30,
        legal_hold_capable: true,
        purge_approved: true,
    };
    assert!(matches!(
        env.archives()
            .override_policy(RecordCategory::SecurityEvent, below_floor, "cco"),
        Err(VaultError::PolicyViolation(_))
    ));

    let update = PolicyUpdate {
        retention_years: 9,
        archive_after_days: 60,
        legal_hold_capable: false,
        purge_approved: true,
    };
    env.archives()
        .override_policy(RecordCategory::SecurityEvent, update, "cco")
        .unwrap();

    env.reopen();

    let policy = env
        .archives()
        .policies()
        .into_iter()
        .find(|p| p.category == RecordCategory::SecurityEvent)
        .unwrap();
    assert_eq!(policy.retention_years, 9);
    assert!(!policy.legal_hold_capable);

    let archive_id = env.create_archive(RecordCategory::SecurityEvent, 1).await;
    let archive = env.archives().get_archive(&archive_id).unwrap();
    assert_eq!(
        archive.expiration_date,
        env.now().checked_add_months(chrono::Months::new(9 * 12))
    );

    assert!(matches!(
        env.holds()
            .place_legal_hold("CASE-1", "counsel", "", &[archive_id])
            .await,
        Err(VaultError::PolicyViolation(_))
    ));

    let ops = env
        .system
        .query_operations(&OperationQuery::new().kinds(vec![OperationKind::PolicyOverridden]))
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].actor, "cco");
}

// =============================================================================
// Status Reporting
// =============================================================================

#[tokio::test]
async fn test_retention_status_report() {
    let env = TestEnv::new();
    let a = env.create_archive(RecordCategory::SystemEvent, 3).await;
    let b = env.create_archive(RecordCategory::SystemEvent, 3).await;
    env.advance_years(1);
    let c = env.create_archive(RecordCategory::SystemEvent, 3).await;

    env.holds()
        .place_legal_hold("CASE-1", "counsel", "", &[b.clone()])
        .await
        .unwrap();

    // a and b expire in 20 days; c a year later.
    env.advance_years(6);
    env.clock.set(
        env.archives().get_archive(&a).unwrap().expiration_date.unwrap() - Duration::days(20),
    );

    let report = env.archives().get_retention_status().unwrap();
    assert_eq!(report.total_archives, 3);
    assert_eq!(report.counts_by_status[&RetentionStatus::Active], 2);
    assert_eq!(report.counts_by_status[&RetentionStatus::LegalHold], 1);
    assert_eq!(report.counts_by_status[&RetentionStatus::Expired], 0);
    assert_eq!(report.counts_by_status[&RetentionStatus::Purged], 0);
    assert_eq!(report.active_legal_holds, 1);
    assert!(report.stored_bytes > 0);
    assert_eq!(report.expiring_window_days, 30);

    let expiring: Vec<_> = report.expiring_soon.iter().map(|e| e.archive_id.clone()).collect();
    assert_eq!(expiring, vec![a]);
    assert!(!expiring.contains(&c));

    let held = env
        .archives()
        .list_archives(&ArchiveQuery::new().status(RetentionStatus::LegalHold))
        .unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].archive_id, b);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_reconcile_tick_expires_verifies_and_prunes() {
    let env = TestEnv::with_config(|config| {
        config.reconciliation.sample_size = 10;
        config.reconciliation.oplog_retention_days = 400;
    });

    let expiring = env.create_archive(RecordCategory::SecurityEvent, 3).await;
    env.advance_years(6);
    let fresh = env.create_archive(RecordCategory::SecurityEvent, 3).await;
    let tampered = env.create_archive(RecordCategory::SecurityEvent, 3).await;
    env.corrupt_blob(&tampered, 40);
    env.advance_years(1);
    env.advance_days(1);

    let report = env.system.reconciler().run_once().await;

    assert_eq!(report.expired, vec![expiring.clone()]);
    assert_eq!(report.violations, vec![tampered.clone()]);
    assert_eq!(report.verified, vec![fresh]);
    assert!(report.failed_steps.is_empty());
    assert!(!report.is_clean());

    // The creation of `expiring` is older than the operational log window.
    assert_eq!(report.pruned_operations, 1);
    assert!(env
        .system
        .query_operations(
            &OperationQuery::new()
                .archive(expiring.as_str())
                .kinds(vec![OperationKind::ArchiveCreated])
        )
        .unwrap()
        .is_empty());

    let ticks = env
        .system
        .query_operations(&OperationQuery::new().kinds(vec![OperationKind::ReconcileTick]))
        .unwrap();
    assert_eq!(ticks.len(), 1);
    assert!(ticks[0].success);

    assert_eq!(
        env.archives().get_archive(&tampered).unwrap().retention_status,
        RetentionStatus::Active
    );
}

#[tokio::test]
async fn test_reconciler_runs_and_shuts_down() {
    let env = TestEnv::with_config(|config| {
        config.reconciliation.interval = std::time::Duration::from_millis(20);
        config.reconciliation.shutdown_timeout = std::time::Duration::from_secs(5);
    });
    let archive_id = env.create_archive(RecordCategory::SystemEvent, 3).await;
    env.advance_years(8);

    let mut events = env.system.subscribe();
    let coordinator = ShutdownCoordinator::new();
    let handle = env.system.reconciler().spawn(&coordinator);

    let completed = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            if let Ok(RetentionEvent::ReconcileCompleted { report }) = events.recv().await {
                return report;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed.expired, vec![archive_id.clone()]);

    handle.shutdown().await.unwrap();
    assert!(coordinator.is_shutting_down());
    assert_eq!(
        env.archives().get_archive(&archive_id).unwrap().retention_status,
        RetentionStatus::Expired
    );
}
