// crates/test-gate-core/tests/harness.rs
// ============================================================================
// Module: Evaluation Harness Tests
// Description: Verdict mapping, stage short-circuiting, and mode handling.
// ============================================================================
//! ## Overview
//! Drives the harness end to end with a scripted sandbox and checks the
//! verdict, stages, and reason recorded for each pipeline outcome.

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

use std::time::Duration;

use test_gate_core::CancelHandle;
use test_gate_core::CancelSignal;
use test_gate_core::HarnessConfig;
use test_gate_core::Language;
use test_gate_core::Mode;
use test_gate_core::PolicyConfig;
use test_gate_core::ReviewPolicy;
use test_gate_core::SandboxLimits;
use test_gate_core::SandboxStatus;
use test_gate_core::Stage;
use test_gate_core::Verdict;

use crate::common::BROKEN_JAVA;
use crate::common::CLEAN_JAVASCRIPT;
use crate::common::CLEAN_PYTHON;
use crate::common::Pipeline;
use crate::common::RANDOM_PYTHON;
use crate::common::ScriptedSandbox;
use crate::common::VAGUE_PYTHON;
use crate::common::artifact;
use crate::common::python_artifact;

// ============================================================================
// SECTION: Verdicts
// ============================================================================

#[tokio::test]
async fn unseeded_random_is_policy_blocked_without_sandbox() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, RANDOM_PYTHON), Mode::Lenient, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::PolicyBlocked);
    assert!(report.reason().contains("nondeterministic-random"));
    assert_eq!(report.stages_run(), &[Stage::Policy]);
    assert_eq!(report.sandbox_result(), SandboxStatus::NotRun);
    assert!(report.sandbox().is_none());
    assert_eq!(pipeline.sandbox.calls(), 0);
}

#[tokio::test]
async fn vague_assertion_needs_review() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, VAGUE_PYTHON), Mode::Lenient, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::NeedsReview);
    assert_eq!(report.sandbox_result(), SandboxStatus::Passed);
    assert!(report.reason().contains("warning"));
}

#[tokio::test]
async fn clean_artifact_passes_after_sandbox() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let report = pipeline
        .harness
        .evaluate(&python_artifact("generated", CLEAN_PYTHON), Mode::Strict, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::Pass);
    assert_eq!(report.stages_run(), &[Stage::Policy, Stage::Sandbox]);
    assert_eq!(report.sandbox().unwrap().exit_code, Some(0));
    assert!(report.score() >= 0.6);
    assert_eq!(pipeline.sandbox.file_names(), vec!["test_generated.py".to_string()]);
    assert_eq!(pipeline.audit.event_names(), vec!["evaluation_completed"]);
}

#[tokio::test]
async fn unparseable_artifact_is_blocked() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Java, BROKEN_JAVA), Mode::Lenient, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::PolicyBlocked);
    assert!(report.reason().contains("unparseable"));
    assert_eq!(pipeline.sandbox.calls(), 0);
}

#[tokio::test]
async fn timed_out_sandbox_fails_in_strict_mode() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::TimedOut));
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, CLEAN_PYTHON), Mode::Strict, &CancelSignal::never())
        .await;
    assert_eq!(report.sandbox_result(), SandboxStatus::TimedOut);
    assert_eq!(report.verdict(), Verdict::SandboxFailed);
    assert!(report.reason().contains("timed out"));
}

#[tokio::test]
async fn timed_out_sandbox_needs_review_in_lenient_mode() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::TimedOut));
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, CLEAN_PYTHON), Mode::Lenient, &CancelSignal::never())
        .await;
    assert_eq!(report.sandbox_result(), SandboxStatus::TimedOut);
    assert_eq!(report.verdict(), Verdict::NeedsReview);
    assert!(report.reason().contains("lenient mode requires review"));
}

#[tokio::test]
async fn failed_sandbox_reports_exit_code() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Failed));
    let report = pipeline
        .harness
        .evaluate(
            &artifact(Language::JavaScript, CLEAN_JAVASCRIPT).with_id("generated".into()),
            Mode::Strict,
            &CancelSignal::never(),
        )
        .await;
    assert_eq!(report.verdict(), Verdict::SandboxFailed);
    assert_eq!(report.reason(), "sandbox failed with exit code 1");
    assert_eq!(pipeline.sandbox.file_names(), vec!["generated.test.js".to_string()]);
}

#[tokio::test]
async fn low_score_needs_review() {
    let harness = HarnessConfig {
        score_threshold: 1.1,
        ..HarnessConfig::default()
    };
    let pipeline = Pipeline::with_config(
        ScriptedSandbox::new(SandboxStatus::Passed),
        PolicyConfig::default(),
        harness,
        ReviewPolicy::default(),
    );
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, CLEAN_PYTHON), Mode::Lenient, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::NeedsReview);
    assert!(report.reason().contains("below threshold"));
}

#[tokio::test]
async fn disabled_sandbox_skips_the_stage() {
    let harness = HarnessConfig {
        sandbox_enabled: false,
        ..HarnessConfig::default()
    };
    let pipeline = Pipeline::with_config(
        ScriptedSandbox::new(SandboxStatus::Failed),
        PolicyConfig::default(),
        harness,
        ReviewPolicy::default(),
    );
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, CLEAN_PYTHON), Mode::Strict, &CancelSignal::never())
        .await;
    assert_eq!(report.verdict(), Verdict::Pass);
    assert_eq!(report.stages_run(), &[Stage::Policy]);
    assert_eq!(pipeline.sandbox.calls(), 0);
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[tokio::test]
async fn cancelled_before_start_runs_no_stage() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    let handle = CancelHandle::new();
    handle.cancel();
    let report = pipeline
        .harness
        .evaluate(&artifact(Language::Python, CLEAN_PYTHON), Mode::Lenient, &handle.signal())
        .await;
    assert_eq!(report.verdict(), Verdict::Cancelled);
    assert!(report.stages_run().is_empty());
    assert_eq!(pipeline.sandbox.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_sandbox_yields_cancelled_verdict() {
    let pipeline = Pipeline::new(ScriptedSandbox::with_delay(SandboxStatus::Passed, Duration::from_secs(60)));
    let handle = CancelHandle::new();
    let signal = handle.signal();
    let target = artifact(Language::Python, CLEAN_PYTHON);
    let evaluation = pipeline.harness.evaluate(&target, Mode::Strict, &signal);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    };
    let (report, ()) = tokio::join!(evaluation, cancel);
    assert_eq!(report.verdict(), Verdict::Cancelled);
    assert_eq!(report.sandbox_result(), SandboxStatus::Cancelled);
}

#[tokio::test]
async fn harness_limits_are_exposed() {
    let pipeline = Pipeline::new(ScriptedSandbox::new(SandboxStatus::Passed));
    assert_eq!(pipeline.harness.config().limits, SandboxLimits::default());
}
