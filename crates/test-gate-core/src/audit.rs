// crates/test-gate-core/src/audit.rs
// ============================================================================
// Module: Test Gate Audit Logging
// Description: Structured audit events for evaluations, reviews, and runs.
// Purpose: Emit JSON-line audit records without a global logger.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events describe every externally meaningful gate action: a finished
//! evaluation, review creation and transitions, lost compare-and-swap races,
//! and run persistence or cancellation. Sinks are injected into runtime
//! components so deployments choose stderr, a file, or nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::ArtifactId;
use crate::core::ReviewId;
use crate::core::ReviewState;
use crate::core::RunId;
use crate::core::Stage;
use crate::core::Verdict;
use crate::core::VerdictCounts;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event-specific fields.
    pub detail: GateAuditDetail,
}

/// Event-specific audit fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GateAuditDetail {
    /// One artifact finished evaluation.
    EvaluationCompleted {
        /// Evaluated artifact.
        artifact_id: ArtifactId,
        /// Resulting verdict.
        verdict: Verdict,
        /// Advisory quality score.
        score: f64,
        /// Stages executed.
        stages: Vec<Stage>,
        /// Evaluation duration in milliseconds.
        duration_ms: u64,
    },
    /// A review was created.
    ReviewCreated {
        /// New review.
        review_id: ReviewId,
        /// Artifact under review.
        artifact_id: ArtifactId,
        /// Requesting run, when known.
        run_id: Option<RunId>,
    },
    /// A review changed state.
    ReviewTransition {
        /// Review identifier.
        review_id: ReviewId,
        /// Previous state.
        from: ReviewState,
        /// New state.
        to: ReviewState,
        /// Deciding reviewer, when any.
        reviewer: Option<String>,
        /// Version after the transition.
        version: u64,
    },
    /// A transition lost a compare-and-swap race or used a stale version.
    ReviewConflict {
        /// Review identifier.
        review_id: ReviewId,
        /// Version supplied by the caller.
        expected_version: u64,
        /// Version currently stored.
        actual_version: u64,
    },
    /// A run report was persisted.
    RunPersisted {
        /// Run identifier.
        run_id: RunId,
        /// Number of artifacts in the run.
        artifacts: usize,
        /// Verdict counts.
        counts: VerdictCounts,
    },
    /// A run observed cancellation.
    RunCancelled {
        /// Run identifier.
        run_id: RunId,
        /// Artifacts that reached a non-cancelled verdict.
        completed: usize,
        /// Artifacts in the run.
        total: usize,
    },
}

impl GateAuditDetail {
    /// Returns the event identifier for this detail.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::EvaluationCompleted {
                ..
            } => "evaluation_completed",
            Self::ReviewCreated {
                ..
            } => "review_created",
            Self::ReviewTransition {
                ..
            } => "review_transition",
            Self::ReviewConflict {
                ..
            } => "review_conflict",
            Self::RunPersisted {
                ..
            } => "run_persisted",
            Self::RunCancelled {
                ..
            } => "run_cancelled",
        }
    }
}

impl GateAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(detail: GateAuditDetail) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: detail.event_name(),
            timestamp_ms,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gate events.
pub trait GateAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GateAuditEvent);

    /// Builds and records an event from its detail.
    fn emit(&self, detail: GateAuditDetail) {
        self.record(&GateAuditEvent::new(detail));
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<GateAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifiers of recorded events in arrival order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(|event| event.event).collect())
            .unwrap_or_default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<GateAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl GateAuditSink for MemoryAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
