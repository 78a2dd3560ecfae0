// crates/test-gate-core/src/runtime/review.rs
// ============================================================================
// Module: Test Gate Review State Machine
// Description: Legal human-in-the-loop review transitions over a review store.
// Purpose: Record reviewer decisions with compare-and-swap accountability.
// Dependencies: thiserror, crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! The state machine is the only writer of review records. A record starts
//! pending at version 1 and moves to approved, rejected, or expired exactly
//! once. Every transition supplies the version the caller observed; the
//! store writes only when that version is still current, so retried or
//! racing decisions never double-apply.
//!
//! Check order for transitions: missing record, then terminal state, then
//! deadline, then stale version. A reviewer decision that arrives after a
//! pending review's deadline expires the review instead and reports it as
//! terminal. Creating a review for an artifact whose pending review is
//! overdue expires the old review and opens the next one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::audit::GateAuditDetail;
use crate::audit::GateAuditSink;
use crate::core::Artifact;
use crate::core::ArtifactId;
use crate::core::Eligibility;
use crate::core::EvaluationReport;
use crate::core::ReviewFilter;
use crate::core::ReviewId;
use crate::core::ReviewRecord;
use crate::core::ReviewState;
use crate::core::RunId;
use crate::core::SandboxStatus;
use crate::core::Severity;
use crate::core::Timestamp;
use crate::interfaces::ReviewStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// A pending review already exists for the artifact.
    #[error("artifact {artifact_id} already has pending review {review_id}")]
    DuplicateReview {
        /// Artifact under review.
        artifact_id: ArtifactId,
        /// Existing pending review.
        review_id: ReviewId,
    },
    /// The caller's expected version is not the stored version.
    #[error("review {review_id} is at version {actual}, expected {expected}")]
    StaleVersion {
        /// Review identifier.
        review_id: ReviewId,
        /// Version supplied by the caller.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
    /// The review already reached a terminal state.
    #[error("review {review_id} is already {}", .state.as_str())]
    AlreadyTerminal {
        /// Review identifier.
        review_id: ReviewId,
        /// Terminal state.
        state: ReviewState,
    },
    /// The review does not exist.
    #[error("review {0} not found")]
    NotFound(ReviewId),
    /// Decision input is invalid (empty reviewer or reason).
    #[error("invalid review decision: {0}")]
    InvalidDecision(String),
    /// Expiry was requested before the deadline.
    #[error("review {review_id} is not due to expire")]
    NotYetDue {
        /// Review identifier.
        review_id: ReviewId,
    },
    /// Review store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Review expiry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewPolicy {
    /// Milliseconds after creation at which a pending review expires.
    pub expiry_ms: Option<u64>,
}

/// Context for creating a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Artifact requiring a decision.
    pub artifact_id: ArtifactId,
    /// Run that requested the review.
    pub run_id: Option<RunId>,
    /// Items the reviewer should verify.
    pub checklist: Vec<String>,
    /// Harness explanation that triggered the review.
    pub verdict_reason: String,
}

/// Terminal decision applied by a transition.
enum Decision {
    /// Approve with an optional note.
    Approve {
        /// Deciding reviewer.
        reviewer: String,
        /// Optional note.
        note: Option<String>,
    },
    /// Reject with a reason.
    Reject {
        /// Deciding reviewer.
        reviewer: String,
        /// Rejection reason.
        reason: String,
    },
    /// Expire after the deadline.
    Expire,
    /// Retire a review whose run was never recorded.
    Withdraw {
        /// Why the review was retired.
        reason: String,
    },
}

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Review state machine over an injected store.
#[derive(Clone)]
pub struct ReviewStateMachine {
    /// Review persistence.
    store: Arc<dyn ReviewStore>,
    /// Expiry policy.
    policy: ReviewPolicy,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
}

impl ReviewStateMachine {
    /// Creates a state machine.
    #[must_use]
    pub fn new(store: Arc<dyn ReviewStore>, policy: ReviewPolicy, audit: Arc<dyn GateAuditSink>) -> Self {
        Self {
            store,
            policy,
            audit,
        }
    }

    /// Returns the expiry policy.
    #[must_use]
    pub const fn policy(&self) -> ReviewPolicy {
        self.policy
    }

    /// Creates a pending review at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::DuplicateReview`] when the artifact already has a
    /// pending review.
    pub fn create_review(&self, request: ReviewRequest, now: Timestamp) -> Result<ReviewRecord, ReviewError> {
        if let Some(existing) = self.store.find_pending(&request.artifact_id)? {
            if !self.is_due(&existing, now) {
                return Err(ReviewError::DuplicateReview {
                    artifact_id: request.artifact_id,
                    review_id: existing.review_id,
                });
            }
            self.expire_overdue(&existing, now)?;
            if let Some(replacement) = self.store.find_pending(&request.artifact_id)? {
                return Err(ReviewError::DuplicateReview {
                    artifact_id: request.artifact_id,
                    review_id: replacement.review_id,
                });
            }
        }
        let sequence = self.store.count_for_artifact(&request.artifact_id)? + 1;
        let record = ReviewRecord {
            review_id: ReviewId::new(format!("{}-r{sequence}", request.artifact_id)),
            artifact_id: request.artifact_id,
            run_id: request.run_id,
            state: ReviewState::Pending,
            created_at: now,
            decided_at: None,
            reviewer: None,
            reason: None,
            version: 1,
            checklist: request.checklist,
            verdict_reason: request.verdict_reason,
        };
        match self.store.create(&record) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                let existing = self.store.find_pending(&record.artifact_id)?;
                return Err(ReviewError::DuplicateReview {
                    artifact_id: record.artifact_id.clone(),
                    review_id: existing.map_or_else(|| record.review_id.clone(), |existing| existing.review_id),
                });
            }
            Err(err) => return Err(err.into()),
        }
        self.audit.emit(GateAuditDetail::ReviewCreated {
            review_id: record.review_id.clone(),
            artifact_id: record.artifact_id.clone(),
            run_id: record.run_id.clone(),
        });
        Ok(record)
    }

    /// Approves a pending review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] when the input is invalid, the review is missing
    /// or terminal, or `expected_version` is stale.
    pub fn approve(
        &self,
        review_id: &ReviewId,
        reviewer: &str,
        note: Option<&str>,
        expected_version: u64,
        now: Timestamp,
    ) -> Result<ReviewRecord, ReviewError> {
        let reviewer = require_text(reviewer, "reviewer must not be empty")?;
        let note = note.map(str::trim).filter(|note| !note.is_empty()).map(str::to_string);
        self.transition(
            review_id,
            expected_version,
            now,
            Decision::Approve {
                reviewer,
                note,
            },
        )
    }

    /// Rejects a pending review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] when the input is invalid, the review is missing
    /// or terminal, or `expected_version` is stale.
    pub fn reject(
        &self,
        review_id: &ReviewId,
        reviewer: &str,
        reason: &str,
        expected_version: u64,
        now: Timestamp,
    ) -> Result<ReviewRecord, ReviewError> {
        let reviewer = require_text(reviewer, "reviewer must not be empty")?;
        let reason = require_text(reason, "rejection reason must not be empty")?;
        self.transition(
            review_id,
            expected_version,
            now,
            Decision::Reject {
                reviewer,
                reason,
            },
        )
    }

    /// Expires a pending review whose deadline has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotYetDue`] when the deadline has not elapsed or
    /// no expiry is configured, and the usual transition errors otherwise.
    pub fn expire(
        &self,
        review_id: &ReviewId,
        expected_version: u64,
        now: Timestamp,
    ) -> Result<ReviewRecord, ReviewError> {
        self.transition(review_id, expected_version, now, Decision::Expire)
    }

    /// Retires a pending review without a reviewer decision.
    ///
    /// The review becomes expired with `reason` regardless of its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] when the reason is empty, the review is missing
    /// or terminal, or `expected_version` is stale.
    pub fn withdraw(
        &self,
        review_id: &ReviewId,
        expected_version: u64,
        reason: &str,
        now: Timestamp,
    ) -> Result<ReviewRecord, ReviewError> {
        let reason = require_text(reason, "withdrawal reason must not be empty")?;
        self.transition(
            review_id,
            expected_version,
            now,
            Decision::Withdraw {
                reason,
            },
        )
    }

    /// Expires every pending review whose deadline has elapsed.
    ///
    /// Reviews decided concurrently are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] when listing or writing fails.
    pub fn expire_due(&self, now: Timestamp) -> Result<Vec<ReviewRecord>, ReviewError> {
        let mut expired = Vec::new();
        for record in self.store.list(&ReviewFilter::pending())? {
            if !self.is_due(&record, now) {
                continue;
            }
            if let Some(updated) = self.expire_overdue(&record, now)? {
                expired.push(updated);
            }
        }
        Ok(expired)
    }

    /// Expires one overdue pending review; `None` when another writer got there first.
    fn expire_overdue(&self, record: &ReviewRecord, now: Timestamp) -> Result<Option<ReviewRecord>, ReviewError> {
        match self.apply(record, now, Decision::Expire) {
            Ok(updated) => Ok(Some(updated)),
            Err(
                ReviewError::StaleVersion {
                    ..
                }
                | ReviewError::NotFound(_),
            ) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Loads a review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] when the review does not exist.
    pub fn get(&self, review_id: &ReviewId) -> Result<ReviewRecord, ReviewError> {
        self.store.get(review_id)?.ok_or_else(|| ReviewError::NotFound(review_id.clone()))
    }

    /// Lists reviews matching a filter.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] when listing fails.
    pub fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>, ReviewError> {
        Ok(self.store.list(filter)?)
    }

    /// Returns every stored version of a review, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] when the review has no history.
    pub fn history(&self, review_id: &ReviewId) -> Result<Vec<ReviewRecord>, ReviewError> {
        let history = self.store.history(review_id)?;
        if history.is_empty() {
            return Err(ReviewError::NotFound(review_id.clone()));
        }
        Ok(history)
    }

    /// Returns the pending review for an artifact, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] when loading fails.
    pub fn find_pending(&self, artifact_id: &ArtifactId) -> Result<Option<ReviewRecord>, ReviewError> {
        Ok(self.store.find_pending(artifact_id)?)
    }

    /// Resolves the execution eligibility implied by a review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] when the review does not exist.
    pub fn eligibility(&self, review_id: &ReviewId) -> Result<Eligibility, ReviewError> {
        let record = self.get(review_id)?;
        Ok(match record.state {
            ReviewState::Pending => Eligibility::PendingReview {
                review_id: record.review_id,
            },
            ReviewState::Approved => Eligibility::Eligible,
            ReviewState::Rejected | ReviewState::Expired => Eligibility::Ineligible,
        })
    }

    /// Returns true when a pending review's deadline has elapsed.
    fn is_due(&self, record: &ReviewRecord, now: Timestamp) -> bool {
        self.policy.expiry_ms.is_some_and(|expiry| {
            now.millis_since(&record.created_at).is_some_and(|elapsed| elapsed >= expiry)
        })
    }

    /// Validates and applies a terminal decision.
    fn transition(
        &self,
        review_id: &ReviewId,
        expected_version: u64,
        now: Timestamp,
        decision: Decision,
    ) -> Result<ReviewRecord, ReviewError> {
        let current = self.get(review_id)?;
        if current.state.is_terminal() {
            return Err(ReviewError::AlreadyTerminal {
                review_id: review_id.clone(),
                state: current.state,
            });
        }
        let due = self.is_due(&current, now);
        match decision {
            Decision::Expire if !due => {
                return Err(ReviewError::NotYetDue {
                    review_id: review_id.clone(),
                });
            }
            Decision::Approve {
                ..
            }
            | Decision::Reject {
                ..
            } if due => {
                let state = match self.expire_overdue(&current, now)? {
                    Some(expired) => expired.state,
                    None => self.get(review_id)?.state,
                };
                return Err(ReviewError::AlreadyTerminal {
                    review_id: review_id.clone(),
                    state,
                });
            }
            _ => {}
        }
        if current.version != expected_version {
            self.audit.emit(GateAuditDetail::ReviewConflict {
                review_id: review_id.clone(),
                expected_version,
                actual_version: current.version,
            });
            return Err(ReviewError::StaleVersion {
                review_id: review_id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }
        self.apply(&current, now, decision)
    }

    /// Writes a terminal decision over `current` with compare-and-swap.
    fn apply(&self, current: &ReviewRecord, now: Timestamp, decision: Decision) -> Result<ReviewRecord, ReviewError> {
        let review_id = &current.review_id;
        let expected_version = current.version;
        let mut updated = current.clone();
        updated.version = current.version + 1;
        updated.decided_at = Some(now);
        match decision {
            Decision::Approve {
                reviewer,
                note,
            } => {
                updated.state = ReviewState::Approved;
                updated.reviewer = Some(reviewer);
                updated.reason = note;
            }
            Decision::Reject {
                reviewer,
                reason,
            } => {
                updated.state = ReviewState::Rejected;
                updated.reviewer = Some(reviewer);
                updated.reason = Some(reason);
            }
            Decision::Expire => {
                updated.state = ReviewState::Expired;
                updated.reason = Some(format!(
                    "expired without a decision after {} ms",
                    self.policy.expiry_ms.unwrap_or_default()
                ));
            }
            Decision::Withdraw {
                reason,
            } => {
                updated.state = ReviewState::Expired;
                updated.reason = Some(reason);
            }
        }

        match self.store.compare_and_swap(&updated, expected_version) {
            Ok(()) => {}
            Err(StoreError::Conflict {
                expected,
                actual,
            }) => {
                self.audit.emit(GateAuditDetail::ReviewConflict {
                    review_id: review_id.clone(),
                    expected_version: expected,
                    actual_version: actual,
                });
                return Err(ReviewError::StaleVersion {
                    review_id: review_id.clone(),
                    expected,
                    actual,
                });
            }
            Err(StoreError::NotFound(_)) => return Err(ReviewError::NotFound(review_id.clone())),
            Err(err) => return Err(err.into()),
        }
        self.audit.emit(GateAuditDetail::ReviewTransition {
            review_id: review_id.clone(),
            from: current.state,
            to: updated.state,
            reviewer: updated.reviewer.clone(),
            version: updated.version,
        });
        Ok(updated)
    }
}

// ============================================================================
// SECTION: Checklist
// ============================================================================

/// Derives the reviewer checklist for an evaluated artifact.
#[must_use]
pub fn review_checklist(report: &EvaluationReport, artifact: &Artifact) -> Vec<String> {
    let mut items = vec![
        "Test verifies the intended behavior of the target code".to_string(),
        "Assertions check specific values rather than existence".to_string(),
        "Test is independent of execution order and external state".to_string(),
    ];
    for violation in report.violations().iter().filter(|violation| violation.severity == Severity::Warn) {
        let location = violation
            .location
            .line()
            .map_or_else(|| "file".to_string(), |line| format!("line {line}"));
        items.push(format!("Resolve {} at {location}: {}", violation.rule_id, violation.message));
    }
    match report.sandbox_result() {
        SandboxStatus::Failed => items.push("Confirm why the sandbox run failed".to_string()),
        SandboxStatus::TimedOut => items.push("Confirm the test cannot hang or run unbounded".to_string()),
        SandboxStatus::NotRun | SandboxStatus::Passed | SandboxStatus::Cancelled => {}
    }
    let source = artifact.source_text();
    if source.contains("async ") || source.contains("await ") {
        items.push("Async code is awaited and cannot leak tasks".to_string());
    }
    if source.contains("mock") || source.contains("Mock") || source.contains("patch(") {
        items.push("Mocks reflect real collaborator behavior".to_string());
    }
    if source.contains("parametrize") || source.contains("ParameterizedTest") || source.contains(".each") {
        items.push("Parametrized cases cover distinct behaviors".to_string());
    }
    if !artifact.target_files().is_empty() {
        items.push(format!("Targets exist and match: {}", artifact.target_files().join(", ")));
    }
    items
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Trims and requires a non-empty decision field.
fn require_text(value: &str, message: &str) -> Result<String, ReviewError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReviewError::InvalidDecision(message.to_string()));
    }
    Ok(trimmed.to_string())
}
