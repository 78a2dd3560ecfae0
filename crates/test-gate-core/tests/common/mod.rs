// crates/test-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for Test Gate core integration tests.
// Purpose: Provide scripted sandboxes, sample artifacts, and wired pipelines.
// Dependencies: test-gate-core, async-trait, tokio
// ============================================================================

//! ## Overview
//! Fixtures here wire the harness, review state machine, and orchestrator to
//! in-memory stores, a manual clock, and a scripted sandbox so integration
//! tests are deterministic and never spawn processes.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use test_gate_core::Artifact;
use test_gate_core::ArtifactId;
use test_gate_core::CancelSignal;
use test_gate_core::EvaluationReport;
use test_gate_core::EvaluationHarness;
use test_gate_core::HarnessConfig;
use test_gate_core::InMemoryReportStore;
use test_gate_core::InMemoryReviewStore;
use test_gate_core::Language;
use test_gate_core::ManualClock;
use test_gate_core::MemoryAuditSink;
use test_gate_core::Mode;
use test_gate_core::Orchestrator;
use test_gate_core::OrchestratorConfig;
use test_gate_core::PolicyChecker;
use test_gate_core::PolicyConfig;
use test_gate_core::ReportStore;
use test_gate_core::ReviewPolicy;
use test_gate_core::ReviewStateMachine;
use test_gate_core::SandboxLimits;
use test_gate_core::SandboxOutcome;
use test_gate_core::SandboxRequest;
use test_gate_core::SandboxRunner;
use test_gate_core::SandboxStatus;
use test_gate_core::RunId;
use test_gate_core::RunReport;
use test_gate_core::StoreError;
use test_gate_core::Timestamp;

// ============================================================================
// SECTION: Sample Artifacts
// ============================================================================

/// Deterministic, documented Python test file with edge-case coverage.
pub const CLEAN_PYTHON: &str = r#""""Tests for the slugify helper."""
import pytest

from text_utils import slugify


def test_slugify_lowercases_ascii_words():
    """Plain words are lowercased and joined with hyphens."""
    assert slugify("Hello World") == "hello-world"


def test_slugify_rejects_none_input():
    """None input raises a TypeError."""
    with pytest.raises(TypeError):
        slugify(None)


@pytest.mark.parametrize("raw, expected", [("a  b", "a-b"), ("", "")])
def test_slugify_collapses_repeated_spaces(raw, expected):
    """Runs of whitespace collapse into one hyphen."""
    assert slugify(raw) == expected
"#;

/// Python test that rolls an unseeded die.
pub const RANDOM_PYTHON: &str = r#"import random

from dice import score_roll


def test_score_roll_counts_pips():
    """Rolls a die and scores it."""
    roll = random.randint(1, 6)
    assert score_roll(roll) == roll
"#;

/// Python test whose only assertion checks existence.
pub const VAGUE_PYTHON: &str = r#"from accounts import load_account


def test_load_account_returns_record():
    """Loading a known account yields a record."""
    account = load_account("acct-1")
    assert account is not None
"#;

/// Deterministic JavaScript test file.
pub const CLEAN_JAVASCRIPT: &str = r#"const { parsePort } = require("./config");

// Valid ports parse to integers.
test("parsePort converts a numeric string", () => {
  expect(parsePort("8080")).toBe(8080);
});

// Invalid ports are rejected with an error.
test("parsePort rejects an empty string", () => {
  expect(() => parsePort("")).toThrow(RangeError);
});
"#;

/// Java test file with an unclosed class body.
pub const BROKEN_JAVA: &str = r#"import org.junit.jupiter.api.Test;

class CalculatorTest {
    @Test
    void addsTwoPositiveNumbers() {
        assertEquals(4, Calculator.add(2, 2));
    }
"#;

/// Builds an artifact at logical time zero.
#[must_use]
pub fn artifact(language: Language, source: &str) -> Artifact {
    Artifact::new(language, source, Timestamp::Logical(0))
}

/// Builds a Python artifact with an explicit identifier.
#[must_use]
pub fn python_artifact(id: &str, source: &str) -> Artifact {
    artifact(Language::Python, source).with_id(id.into())
}

// ============================================================================
// SECTION: Scripted Sandbox
// ============================================================================

/// Sandbox that returns a scripted status after an optional delay.
pub struct ScriptedSandbox {
    /// Status returned for every run.
    status: Mutex<SandboxStatus>,
    /// Simulated run time.
    delay: Duration,
    /// Number of runs started.
    calls: AtomicUsize,
    /// Runs currently in flight.
    in_flight: AtomicUsize,
    /// Highest observed number of concurrent runs.
    peak: AtomicUsize,
    /// File names seen, in call order.
    file_names: Mutex<Vec<String>>,
}

impl ScriptedSandbox {
    /// Creates a sandbox returning `status` immediately.
    #[must_use]
    pub fn new(status: SandboxStatus) -> Self {
        Self::with_delay(status, Duration::ZERO)
    }

    /// Creates a sandbox returning `status` after `delay`.
    #[must_use]
    pub fn with_delay(status: SandboxStatus, delay: Duration) -> Self {
        Self {
            status: Mutex::new(status),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            file_names: Mutex::new(Vec::new()),
        }
    }

    /// Changes the scripted status.
    pub fn set_status(&self, status: SandboxStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Returns the number of runs started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the highest number of concurrent runs observed.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Returns the file names requested so far.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.file_names.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxRunner for ScriptedSandbox {
    async fn run(
        &self,
        request: &SandboxRequest,
        _limits: &SandboxLimits,
        mut cancel: CancelSignal,
    ) -> SandboxOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.file_names.lock().unwrap().push(request.file_name.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let status = *self.status.lock().unwrap();
        let outcome = tokio::select! {
            () = tokio::time::sleep(self.delay) => {
                let mut outcome = SandboxOutcome::new(status, 5);
                outcome.exit_code = match status {
                    SandboxStatus::Passed => Some(0),
                    SandboxStatus::Failed => Some(1),
                    _ => None,
                };
                outcome
            }
            () = cancel.cancelled() => SandboxOutcome::new(SandboxStatus::Cancelled, 5),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ============================================================================
// SECTION: Failing Store
// ============================================================================

/// Report store whose writes always fail.
pub struct FailingReportStore;

impl ReportStore for FailingReportStore {
    fn append_run(&self, _report: &RunReport) -> Result<(), StoreError> {
        Err(StoreError::Io("disk full".to_string()))
    }

    fn load_run(&self, _run_id: &RunId) -> Result<Option<RunReport>, StoreError> {
        Ok(None)
    }

    fn load_evaluation(
        &self,
        _artifact_id: &ArtifactId,
        _run_id: &RunId,
    ) -> Result<Option<EvaluationReport>, StoreError> {
        Ok(None)
    }
}

// ============================================================================
// SECTION: Pipelines
// ============================================================================

/// Fully wired in-memory pipeline.
pub struct Pipeline {
    /// Scripted sandbox shared with the harness.
    pub sandbox: Arc<ScriptedSandbox>,
    /// Manual clock shared by every component.
    pub clock: Arc<ManualClock>,
    /// Audit sink shared by every component.
    pub audit: Arc<MemoryAuditSink>,
    /// Review store.
    pub review_store: Arc<InMemoryReviewStore>,
    /// Report store.
    pub report_store: Arc<InMemoryReportStore>,
    /// Evaluation harness.
    pub harness: Arc<EvaluationHarness>,
    /// Review state machine.
    pub reviews: ReviewStateMachine,
}

impl Pipeline {
    /// Builds a pipeline with default policy and harness configuration.
    #[must_use]
    pub fn new(sandbox: ScriptedSandbox) -> Self {
        Self::with_config(sandbox, PolicyConfig::default(), HarnessConfig::default(), ReviewPolicy::default())
    }

    /// Builds a pipeline with explicit configuration.
    #[must_use]
    pub fn with_config(
        sandbox: ScriptedSandbox,
        policy: PolicyConfig,
        harness: HarnessConfig,
        review_policy: ReviewPolicy,
    ) -> Self {
        let sandbox = Arc::new(sandbox);
        let clock = Arc::new(ManualClock::new(1_000));
        let audit = Arc::new(MemoryAuditSink::new());
        let review_store = Arc::new(InMemoryReviewStore::new());
        let report_store = Arc::new(InMemoryReportStore::new());
        let checker = Arc::new(PolicyChecker::new(policy).unwrap());
        let harness = Arc::new(EvaluationHarness::new(
            checker,
            Arc::clone(&sandbox) as Arc<dyn SandboxRunner>,
            harness,
            Arc::clone(&clock) as _,
            Arc::clone(&audit) as _,
        ));
        let reviews =
            ReviewStateMachine::new(Arc::clone(&review_store) as _, review_policy, Arc::clone(&audit) as _);
        Self {
            sandbox,
            clock,
            audit,
            review_store,
            report_store,
            harness,
            reviews,
        }
    }

    /// Builds an orchestrator over this pipeline.
    #[must_use]
    pub fn orchestrator(&self, mode: Mode, max_workers: usize) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.harness),
            self.reviews.clone(),
            Arc::clone(&self.report_store) as _,
            Arc::clone(&self.clock) as _,
            Arc::clone(&self.audit) as _,
            OrchestratorConfig {
                mode,
                max_workers,
            },
        )
    }
}
