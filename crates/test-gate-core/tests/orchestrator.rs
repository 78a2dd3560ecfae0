// crates/test-gate-core/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: Batch ordering, bounded concurrency, reviews, and cancellation.
// ============================================================================
//! ## Overview
//! Runs batches through the orchestrator against in-memory stores and checks
//! the persisted run report, created reviews, and audit trail.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use test_gate_core::ArtifactId;
use test_gate_core::CancelHandle;
use test_gate_core::CancelSignal;
use test_gate_core::Eligibility;
use test_gate_core::HarnessConfig;
use test_gate_core::Mode;
use test_gate_core::Orchestrator;
use test_gate_core::OrchestratorConfig;
use test_gate_core::OrchestratorError;
use test_gate_core::PolicyConfig;
use test_gate_core::ReportStore;
use test_gate_core::ReviewId;
use test_gate_core::ReviewPolicy;
use test_gate_core::ReviewState;
use test_gate_core::SandboxStatus;
use test_gate_core::StoreError;
use test_gate_core::Verdict;

use crate::common::CLEAN_PYTHON;
use crate::common::FailingReportStore;
use crate::common::Pipeline;
use crate::common::RANDOM_PYTHON;
use crate::common::ScriptedSandbox;
use crate::common::VAGUE_PYTHON;
use crate::common::python_artifact;

// ============================================================================
// SECTION: Batches
// ============================================================================

#[tokio::test]
async fn run_report_follows_input_order_and_counts_verdicts() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 2);
    let batch = vec![
        python_artifact("a-clean", CLEAN_PYTHON),
        python_artifact("b-random", RANDOM_PYTHON),
        python_artifact("c-vague", VAGUE_PYTHON),
    ];
    let run = orchestrator.run(batch, CancelSignal::never()).await.unwrap();

    let ids: Vec<&str> = run.reports.iter().map(|report| report.artifact_id().as_str()).collect();
    assert_eq!(ids, vec!["a-clean", "b-random", "c-vague"]);
    let verdicts: Vec<Verdict> = run.decisions.iter().map(|decision| decision.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::Pass, Verdict::PolicyBlocked, Verdict::NeedsReview]);
    assert_eq!(run.counts.pass, 1);
    assert_eq!(run.counts.policy_blocked, 1);
    assert_eq!(run.counts.needs_review, 1);
    assert_eq!(run.counts.total(), 3);
    assert!(!run.cancelled);
    assert_eq!(run.decisions[0].eligibility, Eligibility::Eligible);
    assert_eq!(run.decisions[1].eligibility, Eligibility::Ineligible);
}

#[tokio::test]
async fn needs_review_creates_one_pending_review() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 4);
    let run = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(run.reviews.len(), 1);
    let review = pipeline.reviews.get(&run.reviews[0]).unwrap();
    assert_eq!(review.state, ReviewState::Pending);
    assert_eq!(review.artifact_id.as_str(), "c-vague");
    assert_eq!(review.run_id.as_ref(), Some(&run.run_id));
    assert!(review.checklist.iter().any(|item| item.contains("vague-assertion")));
    assert_eq!(
        run.decisions[0].eligibility,
        Eligibility::PendingReview {
            review_id: review.review_id.clone(),
        }
    );
}

#[tokio::test]
async fn rerun_reuses_existing_pending_review() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 1);
    let first = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    let second = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.reviews, second.reviews);
    let pending = pipeline.reviews.find_pending(&ArtifactId::new("c-vague")).unwrap().unwrap();
    assert_eq!(pending.version, 1);
}

#[tokio::test]
async fn rerun_replaces_overdue_pending_review() {
    let pipeline = Pipeline::with_config(
        ScriptedSandbox::new(SandboxStatus::Passed),
        PolicyConfig::default(),
        HarnessConfig::default(),
        ReviewPolicy {
            expiry_ms: Some(1_000),
        },
    );
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 1);
    let first = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    pipeline.clock.advance(10_000);
    let second = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(first.reviews[0].as_str(), "c-vague-r1");
    assert_eq!(second.reviews[0].as_str(), "c-vague-r2");
    assert_eq!(pipeline.reviews.get(&first.reviews[0]).unwrap().state, ReviewState::Expired);
    assert_eq!(pipeline.reviews.get(&second.reviews[0]).unwrap().state, ReviewState::Pending);
}

#[tokio::test]
async fn failed_persistence_withdraws_opened_reviews() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = Orchestrator::new(
        Arc::clone(&pipeline.harness),
        pipeline.reviews.clone(),
        Arc::new(FailingReportStore),
        Arc::clone(&pipeline.clock) as _,
        Arc::clone(&pipeline.audit) as _,
        OrchestratorConfig {
            mode: Mode::Lenient,
            max_workers: 1,
        },
    );
    let err = orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Storage(StoreError::Io(_))));

    let artifact = ArtifactId::new("c-vague");
    assert!(pipeline.reviews.find_pending(&artifact).unwrap().is_none());
    let review = pipeline.reviews.get(&ReviewId::new("c-vague-r1")).unwrap();
    assert_eq!(review.state, ReviewState::Expired);
    assert!(review.reason.unwrap().contains("was not recorded"));
}

#[tokio::test]
async fn failed_persistence_keeps_reused_reviews_pending() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    pipeline
        .orchestrator(Mode::Lenient, 1)
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    let orchestrator = Orchestrator::new(
        Arc::clone(&pipeline.harness),
        pipeline.reviews.clone(),
        Arc::new(FailingReportStore),
        Arc::clone(&pipeline.clock) as _,
        Arc::clone(&pipeline.audit) as _,
        OrchestratorConfig {
            mode: Mode::Lenient,
            max_workers: 1,
        },
    );
    orchestrator
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap_err();
    let review = pipeline.reviews.get(&ReviewId::new("c-vague-r1")).unwrap();
    assert_eq!(review.state, ReviewState::Pending);
}

#[tokio::test]
async fn clean_batch_creates_no_reviews() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = pipeline.orchestrator(Mode::Strict, 4);
    let run = orchestrator
        .run(vec![python_artifact("a-clean", CLEAN_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    assert!(run.reviews.is_empty());
    assert!(pipeline.reviews.find_pending(&ArtifactId::new("a-clean")).unwrap().is_none());
}

#[tokio::test]
async fn strict_sandbox_failure_is_ineligible_without_review() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::TimedOut));
    let orchestrator = pipeline.orchestrator(Mode::Strict, 2);
    let run = orchestrator
        .run(vec![python_artifact("a-clean", CLEAN_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(run.counts.sandbox_failed, 1);
    assert!(run.counts.has_failures());
    assert_eq!(run.decisions[0].eligibility, Eligibility::Ineligible);
    assert!(run.reviews.is_empty());
}

#[tokio::test]
async fn run_report_is_persisted_and_loadable() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 2);
    let run = orchestrator
        .run(
            vec![python_artifact("a-clean", CLEAN_PYTHON), python_artifact("c-vague", VAGUE_PYTHON)],
            CancelSignal::never(),
        )
        .await
        .unwrap();
    let stored = pipeline.report_store.load_run(&run.run_id).unwrap().unwrap();
    assert_eq!(stored, run);
    let evaluation =
        pipeline.report_store.load_evaluation(&ArtifactId::new("c-vague"), &run.run_id).unwrap().unwrap();
    assert_eq!(evaluation.verdict(), Verdict::NeedsReview);
    assert_eq!(pipeline.report_store.run_count().unwrap(), 1);
}

#[tokio::test]
async fn empty_batch_produces_empty_report() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let run = pipeline.orchestrator(Mode::Lenient, 2).run(Vec::new(), CancelSignal::never()).await.unwrap();
    assert!(run.reports.is_empty());
    assert_eq!(run.counts.total(), 0);
}

#[tokio::test]
async fn zero_workers_is_invalid() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let err = pipeline
        .orchestrator(Mode::Lenient, 0)
        .run(vec![python_artifact("a-clean", CLEAN_PYTHON)], CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Invalid(_)));
}

#[tokio::test]
async fn audit_trail_covers_evaluation_review_and_persistence() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    pipeline
        .orchestrator(Mode::Lenient, 1)
        .run(vec![python_artifact("c-vague", VAGUE_PYTHON)], CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(pipeline.audit.event_names(), vec!["evaluation_completed", "review_created", "run_persisted"]);
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_max_workers() {
    let pipeline = Pipeline::new(ScriptedSandbox::with_delay(SandboxStatus::Passed, Duration::from_millis(20)));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 2);
    let batch: Vec<_> = (0 .. 6).map(|index| python_artifact(&format!("clean-{index}"), CLEAN_PYTHON)).collect();
    let run = orchestrator.run(batch, CancelSignal::never()).await.unwrap();
    assert_eq!(run.counts.pass, 6);
    assert_eq!(pipeline.sandbox.calls(), 6);
    assert!(pipeline.sandbox.peak_concurrency() <= 2);
    assert!(pipeline.sandbox.peak_concurrency() >= 1);
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[tokio::test]
async fn cancelled_batch_marks_every_unfinished_artifact() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let handle = CancelHandle::new();
    handle.cancel();
    let batch = vec![python_artifact("a-clean", CLEAN_PYTHON), python_artifact("c-vague", VAGUE_PYTHON)];
    let run = pipeline.orchestrator(Mode::Lenient, 1).run(batch, handle.signal()).await.unwrap();
    assert!(run.cancelled);
    assert_eq!(run.counts.cancelled, 2);
    assert!(run.reviews.is_empty());
    assert_eq!(pipeline.sandbox.calls(), 0);
    assert!(pipeline.audit.event_names().contains(&"run_cancelled"));
    assert!(pipeline.report_store.load_run(&run.run_id).unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_keeps_completed_reports() {
    let pipeline = Pipeline::new(ScriptedSandbox::with_delay(SandboxStatus::Passed, Duration::from_secs(1)));
    let orchestrator = pipeline.orchestrator(Mode::Lenient, 1);
    let handle = CancelHandle::new();
    let batch = vec![
        python_artifact("first", CLEAN_PYTHON),
        python_artifact("second", CLEAN_PYTHON),
        python_artifact("third", CLEAN_PYTHON),
    ];
    let run = orchestrator.run(batch, handle.signal());
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.cancel();
    };
    let (run, ()) = tokio::join!(run, cancel);
    let run = run.unwrap();
    assert!(run.cancelled);
    assert_eq!(run.reports.len(), 3);
    assert_eq!(run.counts.pass, 1);
    assert_eq!(run.counts.cancelled, 2);
    assert_eq!(pipeline.sandbox.calls(), 2);
}
