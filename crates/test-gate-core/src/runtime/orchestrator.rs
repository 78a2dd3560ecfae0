// crates/test-gate-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Test Gate Orchestrator
// Description: Bounded-parallel batch runner producing one run report.
// Purpose: Sequence evaluation, review creation, and atomic report persistence.
// Dependencies: serde, thiserror, tokio, crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The orchestrator evaluates a batch with at most `max_workers` artifacts in
//! flight. Workers send `(index, report)` pairs over a channel to the single
//! owning task, which slots them by input index; the run report therefore
//! follows input order regardless of completion order. A worker that never
//! reports (for example because it panicked) yields a cancelled placeholder
//! report rather than a gap.
//!
//! Artifacts that need review get a pending review (an existing pending
//! review for the same artifact is reused unless its deadline has passed).
//! The finished run report is appended to the report store in one write;
//! store failures abort the run. Reviews opened by an aborted run are
//! withdrawn, so no pending review points at a run that was never stored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::audit::GateAuditDetail;
use crate::audit::GateAuditSink;
use crate::core::Artifact;
use crate::core::ArtifactDecision;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::Eligibility;
use crate::core::EvaluationReport;
use crate::core::Mode;
use crate::core::ReviewId;
use crate::core::ReviewRecord;
use crate::core::RunId;
use crate::core::RunReport;
use crate::core::Timestamp;
use crate::core::Verdict;
use crate::core::VerdictCounts;
use crate::core::hash_canonical_json;
use crate::interfaces::Clock;
use crate::interfaces::ReportStore;
use crate::interfaces::StoreError;
use crate::runtime::cancel::CancelSignal;
use crate::runtime::harness::EvaluationHarness;
use crate::runtime::review::ReviewError;
use crate::runtime::review::ReviewRequest;
use crate::runtime::review::ReviewStateMachine;
use crate::runtime::review::review_checklist;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reason recorded when a worker exits without reporting.
const MISSING_REPORT_REASON: &str = "evaluation worker exited without a report";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort an orchestrator run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Persisted data failed integrity checks.
    #[error("storage corruption: {0}")]
    StorageCorruption(String),
    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(StoreError),
    /// Review creation failed.
    #[error("review error: {0}")]
    Review(ReviewError),
    /// Run configuration or input is invalid.
    #[error("invalid run: {0}")]
    Invalid(String),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(message) | StoreError::VersionMismatch(message) => {
                Self::StorageCorruption(message)
            }
            other => Self::Storage(other),
        }
    }
}

impl From<ReviewError> for OrchestratorError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Store(store) => store.into(),
            other => Self::Review(other),
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Evaluation mode for the batch.
    pub mode: Mode,
    /// Maximum artifacts evaluated concurrently.
    pub max_workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Lenient,
            max_workers: 4,
        }
    }
}

/// Verdict tally and eligibility for one batch.
struct BatchOutcome {
    /// Verdict counts.
    counts: VerdictCounts,
    /// Per-artifact decisions in input order.
    decisions: Vec<ArtifactDecision>,
    /// Reviews referenced by the batch, first use order.
    reviews: Vec<ReviewId>,
}

/// Canonical input hashed into run identifiers.
#[derive(Serialize)]
struct RunSeed<'a> {
    /// Run start time.
    started_at: Timestamp,
    /// Per-orchestrator run sequence.
    sequence: u64,
    /// Artifact identifiers in input order.
    artifacts: Vec<&'a str>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Batch runner.
pub struct Orchestrator {
    /// Per-artifact pipeline.
    harness: Arc<EvaluationHarness>,
    /// Review state machine.
    reviews: ReviewStateMachine,
    /// Run report persistence.
    reports: Arc<dyn ReportStore>,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
    /// Batch configuration.
    config: OrchestratorConfig,
    /// Runs started by this orchestrator.
    sequence: AtomicU64,
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        harness: Arc<EvaluationHarness>,
        reviews: ReviewStateMachine,
        reports: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn GateAuditSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            harness,
            reviews,
            reports,
            clock,
            audit,
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the review state machine.
    #[must_use]
    pub const fn reviews(&self) -> &ReviewStateMachine {
        &self.reviews
    }

    /// Returns the batch configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Evaluates a batch and persists its run report.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the configuration is invalid, review
    /// creation fails, or the run report cannot be persisted.
    pub async fn run(
        &self,
        artifacts: Vec<Artifact>,
        cancel: CancelSignal,
    ) -> Result<RunReport, OrchestratorError> {
        if self.config.max_workers == 0 {
            return Err(OrchestratorError::Invalid("max_workers must be greater than zero".to_string()));
        }
        let started_at = self.clock.now();
        let run_id = self.next_run_id(started_at, &artifacts)?;
        let mode = self.config.mode;
        let artifacts: Vec<Arc<Artifact>> = artifacts.into_iter().map(Arc::new).collect();

        let reports = self.evaluate_all(&artifacts, mode, &cancel).await;

        let mut opened = Vec::new();
        let outcome = match self.decide_all(&artifacts, &reports, &run_id, &mut opened) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.withdraw_reviews(&opened, &run_id, &err);
                return Err(err);
            }
        };
        let BatchOutcome {
            counts,
            decisions,
            reviews,
        } = outcome;

        let cancelled = cancel.is_cancelled();
        if cancelled {
            self.audit.emit(GateAuditDetail::RunCancelled {
                run_id: run_id.clone(),
                completed: counts.total() - counts.cancelled,
                total: counts.total(),
            });
        }
        let run = RunReport {
            run_id,
            mode,
            started_at,
            completed_at: self.clock.now(),
            cancelled,
            reports,
            counts,
            reviews,
            decisions,
        };
        if let Err(err) = self.reports.append_run(&run) {
            let err = OrchestratorError::from(err);
            self.withdraw_reviews(&opened, &run.run_id, &err);
            return Err(err);
        }
        self.audit.emit(GateAuditDetail::RunPersisted {
            run_id: run.run_id.clone(),
            artifacts: run.reports.len(),
            counts: run.counts,
        });
        Ok(run)
    }

    /// Evaluates every artifact with bounded concurrency, in input order.
    async fn evaluate_all(
        &self,
        artifacts: &[Arc<Artifact>],
        mode: Mode,
        cancel: &CancelSignal,
    ) -> Vec<EvaluationReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let (sender, mut receiver) = mpsc::channel(artifacts.len().max(1));
        let mut workers = JoinSet::new();
        for (index, artifact) in artifacts.iter().enumerate() {
            let harness = Arc::clone(&self.harness);
            let semaphore = Arc::clone(&semaphore);
            let artifact = Arc::clone(artifact);
            let sender = sender.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let mut waiter = cancel.clone();
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    () = waiter.cancelled() => None,
                };
                let report = harness.evaluate(&artifact, mode, &cancel).await;
                drop(permit);
                let _ = sender.send((index, report)).await;
            });
        }
        drop(sender);

        let mut slots: Vec<Option<EvaluationReport>> = vec![None; artifacts.len()];
        while let Some((index, report)) = receiver.recv().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(report);
            }
        }
        while workers.join_next().await.is_some() {}

        artifacts
            .iter()
            .zip(slots)
            .map(|(artifact, slot)| {
                slot.unwrap_or_else(|| self.harness.cancelled_report(artifact, mode, MISSING_REPORT_REASON))
            })
            .collect()
    }

    /// Tallies verdicts and resolves eligibility, opening reviews as needed.
    ///
    /// Reviews created here are pushed onto `opened` as they are written.
    fn decide_all(
        &self,
        artifacts: &[Arc<Artifact>],
        reports: &[EvaluationReport],
        run_id: &RunId,
        opened: &mut Vec<ReviewRecord>,
    ) -> Result<BatchOutcome, OrchestratorError> {
        let mut outcome = BatchOutcome {
            counts: VerdictCounts::default(),
            decisions: Vec::with_capacity(reports.len()),
            reviews: Vec::new(),
        };
        for (artifact, report) in artifacts.iter().zip(reports) {
            outcome.counts.record(report.verdict());
            let eligibility = match report.verdict() {
                Verdict::Pass => Eligibility::Eligible,
                Verdict::NeedsReview => {
                    let review_id = self.ensure_review(artifact, report, run_id, self.clock.now(), opened)?;
                    if !outcome.reviews.contains(&review_id) {
                        outcome.reviews.push(review_id.clone());
                    }
                    Eligibility::PendingReview {
                        review_id,
                    }
                }
                Verdict::PolicyBlocked | Verdict::SandboxFailed | Verdict::Cancelled => {
                    Eligibility::Ineligible
                }
            };
            outcome.decisions.push(ArtifactDecision {
                artifact_id: artifact.id().clone(),
                verdict: report.verdict(),
                eligibility,
            });
        }
        Ok(outcome)
    }

    /// Creates a review for the artifact or reuses its pending one.
    fn ensure_review(
        &self,
        artifact: &Artifact,
        report: &EvaluationReport,
        run_id: &RunId,
        now: Timestamp,
        opened: &mut Vec<ReviewRecord>,
    ) -> Result<ReviewId, OrchestratorError> {
        let request = ReviewRequest {
            artifact_id: artifact.id().clone(),
            run_id: Some(run_id.clone()),
            checklist: review_checklist(report, artifact),
            verdict_reason: report.reason().to_string(),
        };
        match self.reviews.create_review(request, now) {
            Ok(record) => {
                let review_id = record.review_id.clone();
                opened.push(record);
                Ok(review_id)
            }
            Err(ReviewError::DuplicateReview {
                review_id,
                ..
            }) => Ok(review_id),
            Err(err) => Err(err.into()),
        }
    }

    /// Retires reviews opened by a run that failed before it was stored.
    ///
    /// Withdrawal is best effort; the run error is what the caller sees.
    fn withdraw_reviews(&self, opened: &[ReviewRecord], run_id: &RunId, err: &OrchestratorError) {
        let reason = format!("run {run_id} was not recorded: {err}");
        for record in opened {
            let _ = self.reviews.withdraw(&record.review_id, record.version, &reason, self.clock.now());
        }
    }

    /// Derives a run identifier from the start time and batch contents.
    fn next_run_id(&self, started_at: Timestamp, artifacts: &[Artifact]) -> Result<RunId, OrchestratorError> {
        let seed = RunSeed {
            started_at,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            artifacts: artifacts.iter().map(|artifact| artifact.id().as_str()).collect(),
        };
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &seed)
            .map_err(|err| OrchestratorError::Invalid(err.to_string()))?;
        Ok(RunId::new(format!("run-{}-{}", started_at.sort_key(), digest.short(8))))
    }
}
