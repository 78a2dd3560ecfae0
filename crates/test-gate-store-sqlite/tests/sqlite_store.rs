// crates/test-gate-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Gate Store Tests
// Description: Integrity, concurrency, and persistence tests for the SQLite store.
// Purpose: Validate path safety, schema versioning, CAS, uniqueness, and
//          corruption detection.
// ============================================================================

//! ## Overview
//! Exercises [`SqliteGateStore`] directly and through the review state
//! machine:
//! - Path safety checks (length/component/directory rejection)
//! - Schema version validation
//! - Compare-and-swap and one-pending-review uniqueness
//! - Atomic run report persistence and reopen
//! - Hash verification on load

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use test_gate_core::ArtifactDecision;
use test_gate_core::ArtifactId;
use test_gate_core::DEFAULT_HASH_ALGORITHM;
use test_gate_core::Eligibility;
use test_gate_core::EvaluationReport;
use test_gate_core::EvaluationReportBuilder;
use test_gate_core::MemoryAuditSink;
use test_gate_core::Mode;
use test_gate_core::ReportStore;
use test_gate_core::ReviewError;
use test_gate_core::ReviewFilter;
use test_gate_core::ReviewId;
use test_gate_core::ReviewPolicy;
use test_gate_core::ReviewRecord;
use test_gate_core::ReviewRequest;
use test_gate_core::ReviewState;
use test_gate_core::ReviewStateMachine;
use test_gate_core::ReviewStore;
use test_gate_core::RunId;
use test_gate_core::RunReport;
use test_gate_core::StoreError;
use test_gate_core::Timestamp;
use test_gate_core::Verdict;
use test_gate_core::VerdictCounts;
use test_gate_core::hash_bytes;
use test_gate_store_sqlite::SqliteGateStore;
use test_gate_store_sqlite::SqliteStoreConfig;
use test_gate_store_sqlite::SqliteStoreError;
use test_gate_store_sqlite::SqliteStoreMode;
use test_gate_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_for_path(path: PathBuf) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path,
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    }
}

fn store_for(path: &Path) -> SqliteGateStore {
    SqliteGateStore::new(config_for_path(path.to_path_buf())).expect("store init")
}

fn pending_record(review_id: &str, artifact_id: &str) -> ReviewRecord {
    ReviewRecord {
        review_id: ReviewId::new(review_id),
        artifact_id: ArtifactId::new(artifact_id),
        run_id: Some(RunId::new("run-1")),
        state: ReviewState::Pending,
        created_at: Timestamp::Logical(10),
        decided_at: None,
        reviewer: None,
        reason: None,
        version: 1,
        checklist: vec!["Confirm the assertion checks a concrete value.".to_string()],
        verdict_reason: "quality score 0.40 below threshold 0.60".to_string(),
    }
}

fn approved(record: &ReviewRecord) -> ReviewRecord {
    ReviewRecord {
        state: ReviewState::Approved,
        decided_at: Some(Timestamp::Logical(20)),
        reviewer: Some("dana".to_string()),
        version: record.version + 1,
        ..record.clone()
    }
}

fn evaluation(artifact_id: &str, verdict: Verdict) -> EvaluationReport {
    let builder = EvaluationReportBuilder::new(
        ArtifactId::new(artifact_id),
        Mode::Lenient,
        hash_bytes(DEFAULT_HASH_ALGORITHM, artifact_id.as_bytes()),
        Timestamp::Logical(5),
    );
    builder.finish(verdict, format!("{artifact_id} evaluated"))
}

fn run_report(run_id: &str, artifacts: &[(&str, Verdict)]) -> RunReport {
    let mut counts = VerdictCounts::default();
    let mut reports = Vec::new();
    let mut decisions = Vec::new();
    for (artifact_id, verdict) in artifacts {
        counts.record(*verdict);
        reports.push(evaluation(artifact_id, *verdict));
        decisions.push(ArtifactDecision {
            artifact_id: ArtifactId::new(*artifact_id),
            verdict: *verdict,
            eligibility: if *verdict == Verdict::Pass { Eligibility::Eligible } else { Eligibility::Ineligible },
        });
    }
    RunReport {
        run_id: RunId::new(run_id),
        mode: Mode::Lenient,
        started_at: Timestamp::Logical(1),
        completed_at: Timestamp::Logical(9),
        cancelled: false,
        reports,
        counts,
        reviews: Vec::new(),
        decisions,
    }
}

fn raw_connection(path: &Path) -> Connection {
    Connection::open(path).unwrap()
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqliteGateStore::new(config_for_path(temp.path().to_path_buf())) else {
        panic!("expected directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_overlong_component() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a".repeat(300)).join("store.db");
    let Err(err) = SqliteGateStore::new(config_for_path(path)) else {
        panic!("expected overlong component to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_overlong_path() {
    let temp = TempDir::new().unwrap();
    let mut path = temp.path().to_path_buf();
    for _ in 0 .. 40 {
        path.push("b".repeat(120));
    }
    path.push("store.db");
    let Err(err) = SqliteGateStore::new(config_for_path(path)) else {
        panic!("expected overlong path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_empty_path() {
    let Err(err) = SqliteGateStore::new(config_for_path(PathBuf::new())) else {
        panic!("expected empty path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_creates_missing_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("state").join("gate.db");
    let _store = store_for(&path);
    assert!(path.exists());
}

// ============================================================================
// SECTION: Schema Versioning
// ============================================================================

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    drop(store_for(&path));
    raw_connection(&path).execute("UPDATE store_meta SET version = ?1", params![99_i64]).unwrap();
    let Err(err) = SqliteGateStore::new(config_for_path(path)) else {
        panic!("expected version mismatch");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn sqlite_store_reopens_existing_database() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    store_for(&path).create(&pending_record("art-a-r1", "art-a")).unwrap();
    let reopened = store_for(&path);
    let record = reopened.get(&ReviewId::new("art-a-r1")).unwrap().unwrap();
    assert_eq!(record, pending_record("art-a-r1", "art-a"));
}

#[test]
fn sqlite_store_supports_delete_journal_mode() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for_path(temp.path().join("gate.db"));
    config.journal_mode = SqliteStoreMode::Delete;
    config.sync_mode = SqliteSyncMode::Normal;
    let store = SqliteGateStore::new(config).unwrap();
    store.create(&pending_record("art-a-r1", "art-a")).unwrap();
    assert_eq!(store.count_for_artifact(&ArtifactId::new("art-a")).unwrap(), 1);
}

// ============================================================================
// SECTION: Reviews
// ============================================================================

#[test]
fn create_rejects_second_pending_review_for_artifact() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    store.create(&pending_record("art-a-r1", "art-a")).unwrap();
    let err = store.create(&pending_record("art-a-r2", "art-a")).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
    let err = store.create(&pending_record("art-a-r1", "art-b")).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn create_allows_new_pending_review_after_decision() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let first = pending_record("art-a-r1", "art-a");
    store.create(&first).unwrap();
    store.compare_and_swap(&approved(&first), 1).unwrap();
    store.create(&pending_record("art-a-r2", "art-a")).unwrap();
    assert_eq!(store.count_for_artifact(&ArtifactId::new("art-a")).unwrap(), 2);
    let pending = store.find_pending(&ArtifactId::new("art-a")).unwrap().unwrap();
    assert_eq!(pending.review_id.as_str(), "art-a-r2");
}

#[test]
fn compare_and_swap_enforces_expected_version() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let record = pending_record("art-a-r1", "art-a");
    store.create(&record).unwrap();
    let next = approved(&record);
    store.compare_and_swap(&next, 1).unwrap();

    let again = ReviewRecord {
        version: 3,
        ..next.clone()
    };
    let err = store.compare_and_swap(&again, 1).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 2 }));
    assert_eq!(store.get(&record.review_id).unwrap().unwrap(), next);
}

#[test]
fn compare_and_swap_requires_single_version_step() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let record = pending_record("art-a-r1", "art-a");
    store.create(&record).unwrap();
    let skipping = ReviewRecord {
        version: 5,
        ..approved(&record)
    };
    let err = store.compare_and_swap(&skipping, 1).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn compare_and_swap_on_missing_review_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let err = store.compare_and_swap(&approved(&pending_record("ghost-r1", "ghost")), 1).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn history_lists_every_version_in_order() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let record = pending_record("art-a-r1", "art-a");
    store.create(&record).unwrap();
    store.compare_and_swap(&approved(&record), 1).unwrap();
    let history = store.history(&record.review_id).unwrap();
    let versions: Vec<u64> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![1, 2]);
    assert_eq!(history[0].state, ReviewState::Pending);
    assert_eq!(history[1].state, ReviewState::Approved);
}

#[test]
fn list_filters_by_state_and_artifact_in_id_order() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    let b = pending_record("art-b-r1", "art-b");
    store.create(&b).unwrap();
    store.create(&pending_record("art-a-r1", "art-a")).unwrap();
    store.create(&pending_record("art-c-r1", "art-c")).unwrap();
    store.compare_and_swap(&approved(&b), 1).unwrap();

    let all = store.list(&ReviewFilter::default()).unwrap();
    let ids: Vec<&str> = all.iter().map(|record| record.review_id.as_str()).collect();
    assert_eq!(ids, vec!["art-a-r1", "art-b-r1", "art-c-r1"]);

    let pending = store.list(&ReviewFilter::pending()).unwrap();
    assert_eq!(pending.len(), 2);

    let only_b = store
        .list(&ReviewFilter {
            state: Some(ReviewState::Approved),
            artifact_id: Some(ArtifactId::new("art-b")),
        })
        .unwrap();
    assert_eq!(only_b.len(), 1);
    assert_eq!(only_b[0].reviewer.as_deref(), Some("dana"));
}

#[test]
fn concurrent_compare_and_swap_has_single_winner() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("gate.db")));
    let record = pending_record("art-a-r1", "art-a");
    store.create(&record).unwrap();

    let handles: Vec<_> = (0 .. 8)
        .map(|index| {
            let store = Arc::clone(&store);
            let candidate = ReviewRecord {
                reviewer: Some(format!("reviewer-{index}")),
                ..approved(&record)
            };
            thread::spawn(move || store.compare_and_swap(&candidate, 1))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|err| matches!(err, StoreError::Conflict { .. }))
    );
    assert_eq!(store.history(&record.review_id).unwrap().len(), 2);
}

#[test]
fn review_state_machine_runs_against_sqlite() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("gate.db")));
    let audit = Arc::new(MemoryAuditSink::new());
    let reviews = ReviewStateMachine::new(Arc::clone(&store) as _, ReviewPolicy::default(), audit);
    let request = ReviewRequest {
        artifact_id: ArtifactId::new("art-a"),
        run_id: None,
        checklist: Vec::new(),
        verdict_reason: "needs a human".to_string(),
    };
    let created = reviews.create_review(request.clone(), Timestamp::Logical(1)).unwrap();
    let err = reviews.create_review(request, Timestamp::Logical(2)).unwrap_err();
    assert!(matches!(err, ReviewError::DuplicateReview { .. }));

    let rejected = reviews
        .reject(&created.review_id, "sam", "asserts nothing", created.version, Timestamp::Logical(3))
        .unwrap();
    assert_eq!(rejected.state, ReviewState::Rejected);

    let err = reviews
        .approve(&created.review_id, "dana", None, rejected.version, Timestamp::Logical(4))
        .unwrap_err();
    assert!(matches!(err, ReviewError::AlreadyTerminal { state: ReviewState::Rejected, .. }));
    assert_eq!(reviews.get(&created.review_id).unwrap(), rejected);
}

// ============================================================================
// SECTION: Reports
// ============================================================================

#[test]
fn append_run_persists_run_and_evaluations() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    let run = run_report("run-1", &[("art-a", Verdict::Pass), ("art-b", Verdict::PolicyBlocked)]);
    store.append_run(&run).unwrap();

    let reopened = store_for(&path);
    assert_eq!(reopened.load_run(&RunId::new("run-1")).unwrap().unwrap(), run);
    let evaluation =
        reopened.load_evaluation(&ArtifactId::new("art-b"), &RunId::new("run-1")).unwrap().unwrap();
    assert_eq!(evaluation.verdict(), Verdict::PolicyBlocked);
    assert!(reopened.load_evaluation(&ArtifactId::new("art-z"), &RunId::new("run-1")).unwrap().is_none());
    assert!(reopened.load_run(&RunId::new("run-2")).unwrap().is_none());
}

#[test]
fn append_run_rejects_duplicate_run_id_without_partial_rows() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    store.append_run(&run_report("run-1", &[("art-a", Verdict::Pass)])).unwrap();
    let err = store
        .append_run(&run_report("run-1", &[("art-a", Verdict::Pass), ("art-b", Verdict::Pass)]))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));

    let rows: i64 = raw_connection(&path)
        .query_row("SELECT COUNT(1) FROM evaluation_reports WHERE run_id = 'run-1'", params![], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn list_runs_returns_summaries() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("gate.db"));
    store.append_run(&run_report("run-1", &[("art-a", Verdict::Pass)])).unwrap();
    store.append_run(&run_report("run-2", &[("art-a", Verdict::Pass), ("art-b", Verdict::Pass)])).unwrap();
    let summaries = store.list_runs(10).unwrap();
    assert_eq!(summaries.len(), 2);
    let run_two = summaries.iter().find(|summary| summary.run_id.as_str() == "run-2").unwrap();
    assert_eq!(run_two.artifacts, 2);
    assert!(!run_two.cancelled);
    assert_eq!(store.list_runs(1).unwrap().len(), 1);
}

// ============================================================================
// SECTION: Corruption
// ============================================================================

#[test]
fn tampered_review_payload_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    store.create(&pending_record("art-a-r1", "art-a")).unwrap();
    raw_connection(&path)
        .execute(
            "UPDATE reviews SET record_json = CAST(replace(record_json, 'pending', 'approved') AS BLOB) \
             WHERE review_id = ?1",
            params!["art-a-r1"],
        )
        .unwrap();
    let err = store.get(&ReviewId::new("art-a-r1")).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
    let err = store.list(&ReviewFilter::default()).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn tampered_run_hash_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    store.append_run(&run_report("run-1", &[("art-a", Verdict::Pass)])).unwrap();
    raw_connection(&path)
        .execute("UPDATE run_reports SET report_hash = 'deadbeef' WHERE run_id = ?1", params!["run-1"])
        .unwrap();
    let err = store.load_run(&RunId::new("run-1")).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn unknown_hash_algorithm_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    store.append_run(&run_report("run-1", &[("art-a", Verdict::Pass)])).unwrap();
    raw_connection(&path)
        .execute("UPDATE evaluation_reports SET hash_algorithm = 'md5' WHERE run_id = ?1", params!["run-1"])
        .unwrap();
    let err = store.load_evaluation(&ArtifactId::new("art-a"), &RunId::new("run-1")).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn mismatched_version_column_is_corruption() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate.db");
    let store = store_for(&path);
    store.create(&pending_record("art-a-r1", "art-a")).unwrap();
    raw_connection(&path).execute("UPDATE reviews SET version = 7 WHERE review_id = 'art-a-r1'", params![]).unwrap();
    let err = store.get(&ReviewId::new("art-a-r1")).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn review_text_survives_storage(
        checklist in proptest::collection::vec("\\PC{0,40}", 0 .. 4),
        verdict_reason in "\\PC{0,80}",
    ) {
        let temp = TempDir::new().unwrap();
        let store = store_for(&temp.path().join("gate.db"));
        let record = ReviewRecord {
            checklist,
            verdict_reason,
            ..pending_record("art-p-r1", "art-p")
        };
        store.create(&record).unwrap();
        prop_assert_eq!(store.get(&record.review_id).unwrap().unwrap(), record);
    }
}
