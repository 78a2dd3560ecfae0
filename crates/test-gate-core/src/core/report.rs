// crates/test-gate-core/src/core/report.rs
// ============================================================================
// Module: Test Gate Reports
// Description: Evaluation reports, sandbox outcomes, and batch run reports.
// Purpose: Capture per-artifact verdicts and batch aggregates as stable records.
// Dependencies: serde, crate::core::{hashing, identifiers, policy, time}
// ============================================================================

//! ## Overview
//! An [`EvaluationReport`] is assembled by [`EvaluationReportBuilder`] while
//! the harness runs its stages; `finish` consumes the builder, so a report is
//! immutable once its verdict is set. A [`RunReport`] aggregates one batch in
//! input order and is the unit persisted by report stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::ReviewId;
use crate::core::identifiers::RunId;
use crate::core::policy::PolicyOutcome;
use crate::core::policy::PolicyViolation;
use crate::core::policy::QualityBreakdown;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Modes and Stages
// ============================================================================

/// Evaluation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Sandbox failures are routed to human review.
    #[default]
    Lenient,
    /// Sandbox failures are final.
    Strict,
}

impl Mode {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

/// Pipeline stage executed during an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Static policy check.
    Policy,
    /// Sandboxed parse/compile/run.
    Sandbox,
}

// ============================================================================
// SECTION: Sandbox Outcome
// ============================================================================

/// Terminal status of a sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    /// The sandbox stage did not execute.
    #[default]
    NotRun,
    /// All commands exited successfully.
    Passed,
    /// A command failed, could not spawn, or no toolchain was available.
    Failed,
    /// The wall-clock limit elapsed and the process was killed.
    TimedOut,
    /// The batch was cancelled while the process ran.
    Cancelled,
}

impl SandboxStatus {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRun => "not_run",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Captured result of one sandbox run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxOutcome {
    /// Terminal status.
    pub status: SandboxStatus,
    /// Captured stdout tail.
    pub stdout: String,
    /// Captured stderr tail.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Exit code of the last command, when it exited normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl SandboxOutcome {
    /// Creates an outcome with empty output.
    #[must_use]
    pub const fn new(status: SandboxStatus, duration_ms: u64) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms,
            exit_code: None,
        }
    }

    /// Creates a failed outcome carrying a diagnostic on stderr.
    #[must_use]
    pub fn failed(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: SandboxStatus::Failed,
            stdout: String::new(),
            stderr: message.into(),
            duration_ms,
            exit_code: None,
        }
    }
}

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Harness outcome for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Safe to execute.
    Pass,
    /// A blocking policy violation was found.
    PolicyBlocked,
    /// Sandbox failed or timed out in strict mode.
    SandboxFailed,
    /// A human decision is required.
    NeedsReview,
    /// The batch was cancelled before a verdict was reached.
    Cancelled,
}

impl Verdict {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::PolicyBlocked => "policy_blocked",
            Self::SandboxFailed => "sandbox_failed",
            Self::NeedsReview => "needs_review",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for verdicts that make the artifact ineligible outright.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::PolicyBlocked | Self::SandboxFailed | Self::Cancelled)
    }
}

// ============================================================================
// SECTION: Evaluation Report
// ============================================================================

/// Immutable result of evaluating one artifact.
///
/// # Invariants
/// - `stages_run` lists only stages that actually executed, in order.
/// - `score` is `0.0` whenever a blocking violation is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Evaluated artifact.
    artifact_id: ArtifactId,
    /// Evaluation strictness.
    mode: Mode,
    /// Stages executed in order.
    stages_run: Vec<Stage>,
    /// Policy violations.
    violations: Vec<PolicyViolation>,
    /// Advisory quality score.
    score: f64,
    /// Score sub-signals.
    breakdown: QualityBreakdown,
    /// Sandbox status summary.
    sandbox_result: SandboxStatus,
    /// Captured sandbox outcome when the stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sandbox: Option<SandboxOutcome>,
    /// Final verdict.
    verdict: Verdict,
    /// One-line explanation of the verdict.
    reason: String,
    /// Hash of the evaluated source text.
    source_hash: HashDigest,
    /// Evaluation timestamp.
    evaluated_at: Timestamp,
}

impl EvaluationReport {
    /// Returns the artifact identifier.
    #[must_use]
    pub const fn artifact_id(&self) -> &ArtifactId {
        &self.artifact_id
    }

    /// Returns the evaluation mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the stages executed.
    #[must_use]
    pub fn stages_run(&self) -> &[Stage] {
        &self.stages_run
    }

    /// Returns the policy violations.
    #[must_use]
    pub fn violations(&self) -> &[PolicyViolation] {
        &self.violations
    }

    /// Returns the quality score.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Returns the score sub-signals.
    #[must_use]
    pub const fn breakdown(&self) -> &QualityBreakdown {
        &self.breakdown
    }

    /// Returns the sandbox status summary.
    #[must_use]
    pub const fn sandbox_result(&self) -> SandboxStatus {
        self.sandbox_result
    }

    /// Returns the captured sandbox outcome, if the stage ran.
    #[must_use]
    pub const fn sandbox(&self) -> Option<&SandboxOutcome> {
        self.sandbox.as_ref()
    }

    /// Returns the verdict.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Returns the verdict explanation.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the source hash.
    #[must_use]
    pub const fn source_hash(&self) -> &HashDigest {
        &self.source_hash
    }

    /// Returns the evaluation timestamp.
    #[must_use]
    pub const fn evaluated_at(&self) -> Timestamp {
        self.evaluated_at
    }
}

/// Incremental builder for an [`EvaluationReport`].
#[derive(Debug, Clone)]
pub struct EvaluationReportBuilder {
    /// Report under construction.
    report: EvaluationReport,
}

impl EvaluationReportBuilder {
    /// Starts a report with no stages and no findings.
    #[must_use]
    pub const fn new(
        artifact_id: ArtifactId,
        mode: Mode,
        source_hash: HashDigest,
        evaluated_at: Timestamp,
    ) -> Self {
        Self {
            report: EvaluationReport {
                artifact_id,
                mode,
                stages_run: Vec::new(),
                violations: Vec::new(),
                score: 0.0,
                breakdown: QualityBreakdown {
                    naming: 0.0,
                    assertion: 0.0,
                    isolation: 0.0,
                    edge_cases: 0.0,
                    documentation: 0.0,
                },
                sandbox_result: SandboxStatus::NotRun,
                sandbox: None,
                verdict: Verdict::Cancelled,
                reason: String::new(),
                source_hash,
                evaluated_at,
            },
        }
    }

    /// Records the policy stage and its outcome.
    pub fn record_policy(&mut self, outcome: PolicyOutcome) -> &mut Self {
        self.report.stages_run.push(Stage::Policy);
        self.report.violations = outcome.violations;
        self.report.score = outcome.score;
        self.report.breakdown = outcome.breakdown;
        self
    }

    /// Records the sandbox stage and its outcome.
    pub fn record_sandbox(&mut self, outcome: SandboxOutcome) -> &mut Self {
        self.report.stages_run.push(Stage::Sandbox);
        self.report.sandbox_result = outcome.status;
        self.report.sandbox = Some(outcome);
        self
    }

    /// Seals the report with its verdict.
    #[must_use]
    pub fn finish(mut self, verdict: Verdict, reason: impl Into<String>) -> EvaluationReport {
        self.report.verdict = verdict;
        self.report.reason = reason.into();
        self.report
    }
}

// ============================================================================
// SECTION: Run Report
// ============================================================================

/// Execution eligibility decided for one artifact in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Eligibility {
    /// Safe to execute.
    Eligible,
    /// Awaiting a human decision.
    PendingReview {
        /// Review tracking the decision.
        review_id: ReviewId,
    },
    /// Must not execute.
    Ineligible,
}

/// Per-artifact decision within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDecision {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Harness verdict.
    pub verdict: Verdict,
    /// Resulting eligibility.
    pub eligibility: Eligibility,
}

/// Report counts keyed by verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerdictCounts {
    /// Reports with verdict `pass`.
    pub pass: usize,
    /// Reports with verdict `policy_blocked`.
    pub policy_blocked: usize,
    /// Reports with verdict `sandbox_failed`.
    pub sandbox_failed: usize,
    /// Reports with verdict `needs_review`.
    pub needs_review: usize,
    /// Reports with verdict `cancelled`.
    pub cancelled: usize,
}

impl VerdictCounts {
    /// Increments the counter for a verdict.
    pub const fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::PolicyBlocked => self.policy_blocked += 1,
            Verdict::SandboxFailed => self.sandbox_failed += 1,
            Verdict::NeedsReview => self.needs_review += 1,
            Verdict::Cancelled => self.cancelled += 1,
        }
    }

    /// Returns the total number of counted reports.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pass + self.policy_blocked + self.sandbox_failed + self.needs_review + self.cancelled
    }

    /// Returns true when any report failed outright.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.policy_blocked + self.sandbox_failed + self.cancelled > 0
    }
}

/// Aggregate of one orchestrator batch.
///
/// # Invariants
/// - `reports` and `decisions` follow input order and have equal length.
/// - `counts.total()` equals `reports.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Evaluation mode used for the batch.
    pub mode: Mode,
    /// Batch start timestamp.
    pub started_at: Timestamp,
    /// Batch completion timestamp.
    pub completed_at: Timestamp,
    /// True when the batch was cancelled.
    pub cancelled: bool,
    /// Per-artifact reports in input order.
    pub reports: Vec<EvaluationReport>,
    /// Counts by verdict.
    pub counts: VerdictCounts,
    /// Reviews created or reused during the run.
    pub reviews: Vec<ReviewId>,
    /// Per-artifact eligibility decisions in input order.
    pub decisions: Vec<ArtifactDecision>,
}
