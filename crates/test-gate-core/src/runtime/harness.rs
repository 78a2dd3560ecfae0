// crates/test-gate-core/src/runtime/harness.rs
// ============================================================================
// Module: Test Gate Evaluation Harness
// Description: Ordered, short-circuiting evaluation pipeline per artifact.
// Purpose: Combine policy checking and sandboxing into one verdict.
// Dependencies: crate::{audit, core, interfaces, runtime::{cancel, policy}}
// ============================================================================

//! ## Overview
//! The harness runs the policy stage, then (only when nothing blocked and
//! sandboxing is enabled) the sandbox stage, and maps the combined result to
//! a [`Verdict`]. Stages never overlap for one artifact. Lenient mode routes
//! sandbox failures to human review; strict mode fails them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::audit::GateAuditDetail;
use crate::audit::GateAuditSink;
use crate::core::Artifact;
use crate::core::EvaluationReport;
use crate::core::EvaluationReportBuilder;
use crate::core::Mode;
use crate::core::PolicyOutcome;
use crate::core::SandboxStatus;
use crate::core::Severity;
use crate::core::Verdict;
use crate::interfaces::Clock;
use crate::interfaces::SandboxLimits;
use crate::interfaces::SandboxRequest;
use crate::interfaces::SandboxRunner;
use crate::runtime::cancel::CancelSignal;
use crate::runtime::policy::PolicyChecker;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Harness configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarnessConfig {
    /// Scores below this threshold route the artifact to review.
    pub score_threshold: f64,
    /// Whether the sandbox stage runs.
    pub sandbox_enabled: bool,
    /// Limits applied to each sandbox run.
    pub limits: SandboxLimits,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            sandbox_enabled: true,
            limits: SandboxLimits::default(),
        }
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Per-artifact evaluation pipeline.
pub struct EvaluationHarness {
    /// Static policy checker.
    checker: Arc<PolicyChecker>,
    /// Sandbox backend.
    sandbox: Arc<dyn SandboxRunner>,
    /// Harness configuration.
    config: HarnessConfig,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
}

impl EvaluationHarness {
    /// Creates a harness.
    #[must_use]
    pub fn new(
        checker: Arc<PolicyChecker>,
        sandbox: Arc<dyn SandboxRunner>,
        config: HarnessConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn GateAuditSink>,
    ) -> Self {
        Self {
            checker,
            sandbox,
            config,
            clock,
            audit,
        }
    }

    /// Returns the harness configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Evaluates one artifact.
    pub async fn evaluate(
        &self,
        artifact: &Artifact,
        mode: Mode,
        cancel: &CancelSignal,
    ) -> EvaluationReport {
        let started = Instant::now();
        let report = self.run_stages(artifact, mode, cancel).await;
        self.audit.emit(GateAuditDetail::EvaluationCompleted {
            artifact_id: artifact.id().clone(),
            verdict: report.verdict(),
            score: report.score(),
            stages: report.stages_run().to_vec(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        report
    }

    /// Builds a report for an artifact that never started evaluation.
    #[must_use]
    pub fn cancelled_report(&self, artifact: &Artifact, mode: Mode, reason: &str) -> EvaluationReport {
        EvaluationReportBuilder::new(
            artifact.id().clone(),
            mode,
            artifact.source_hash(),
            self.clock.now(),
        )
        .finish(Verdict::Cancelled, reason)
    }

    /// Runs the stages and seals the report.
    async fn run_stages(
        &self,
        artifact: &Artifact,
        mode: Mode,
        cancel: &CancelSignal,
    ) -> EvaluationReport {
        if cancel.is_cancelled() {
            return self.cancelled_report(artifact, mode, "cancelled before evaluation started");
        }
        let mut builder = EvaluationReportBuilder::new(
            artifact.id().clone(),
            mode,
            artifact.source_hash(),
            self.clock.now(),
        );

        let outcome = self.checker.check(artifact);
        let first_block = outcome.first_block().map(|violation| {
            format!("{}: {}", violation.rule_id, violation.message)
        });
        let warn_count = count_warnings(&outcome);
        let score = outcome.score;
        builder.record_policy(outcome);
        if let Some(block) = first_block {
            return builder.finish(Verdict::PolicyBlocked, format!("blocked by {block}"));
        }

        if self.config.sandbox_enabled {
            let request = SandboxRequest {
                artifact_id: artifact.id().clone(),
                language: artifact.language().clone(),
                source_text: artifact.shared_source(),
                file_name: artifact.suggested_file_name(),
            };
            let sandbox = self.sandbox.run(&request, &self.config.limits, cancel.clone()).await;
            let status = sandbox.status;
            let exit_code = sandbox.exit_code;
            builder.record_sandbox(sandbox);
            match status {
                SandboxStatus::Cancelled => {
                    return builder.finish(Verdict::Cancelled, "sandbox run cancelled");
                }
                SandboxStatus::Failed | SandboxStatus::TimedOut => {
                    let detail = match (status, exit_code) {
                        (SandboxStatus::TimedOut, _) => format!(
                            "sandbox timed out after {} ms",
                            self.config.limits.timeout.as_millis()
                        ),
                        (_, Some(code)) => format!("sandbox failed with exit code {code}"),
                        _ => "sandbox failed".to_string(),
                    };
                    return match mode {
                        Mode::Strict => builder.finish(Verdict::SandboxFailed, detail),
                        Mode::Lenient => {
                            builder.finish(Verdict::NeedsReview, format!("{detail}; lenient mode requires review"))
                        }
                    };
                }
                SandboxStatus::Passed | SandboxStatus::NotRun => {}
            }
        }

        if warn_count > 0 {
            return builder.finish(
                Verdict::NeedsReview,
                format!("{warn_count} policy warning(s) require review"),
            );
        }
        if score < self.config.score_threshold {
            return builder.finish(
                Verdict::NeedsReview,
                format!(
                    "quality score {score:.4} is below threshold {:.4}",
                    self.config.score_threshold
                ),
            );
        }
        builder.finish(Verdict::Pass, format!("all checks passed with quality score {score:.4}"))
    }
}

/// Counts warn-level violations.
fn count_warnings(outcome: &PolicyOutcome) -> usize {
    outcome.violations.iter().filter(|violation| violation.severity == Severity::Warn).count()
}
