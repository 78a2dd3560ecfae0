// crates/test-gate-core/src/core/review.rs
// ============================================================================
// Module: Test Gate Review Records
// Description: Human-in-the-loop review records and their lifecycle states.
// Purpose: Provide the durable, versioned record of a human decision.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A [`ReviewRecord`] tracks one human decision for an artifact. Records move
//! from `pending` to exactly one terminal state and carry a monotonically
//! increasing version used for compare-and-swap writes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::ReviewId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Review State
// ============================================================================

/// Lifecycle state of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    /// Awaiting a decision.
    Pending,
    /// Approved by a reviewer.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
    /// Deadline elapsed without a decision.
    Expired,
}

impl ReviewState {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Parses a canonical label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Returns true for states with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ============================================================================
// SECTION: Review Record
// ============================================================================

/// Versioned review record.
///
/// # Invariants
/// - `version` starts at 1 and increases by one per transition.
/// - `reviewer` is set exactly when the state is approved or rejected.
/// - `reason` is non-empty when the state is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Review identifier.
    pub review_id: ReviewId,
    /// Artifact under review.
    pub artifact_id: ArtifactId,
    /// Run that requested the review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Current state.
    pub state: ReviewState,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Terminal transition timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<Timestamp>,
    /// Deciding reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    /// Decision reason or expiry note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Compare-and-swap version.
    pub version: u64,
    /// Items the reviewer should verify.
    #[serde(default)]
    pub checklist: Vec<String>,
    /// Harness explanation that triggered the review.
    #[serde(default)]
    pub verdict_reason: String,
}

// ============================================================================
// SECTION: Review Filter
// ============================================================================

/// Selection criteria for listing reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    /// Restrict to one state.
    pub state: Option<ReviewState>,
    /// Restrict to one artifact.
    pub artifact_id: Option<ArtifactId>,
}

impl ReviewFilter {
    /// Returns a filter selecting pending reviews.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            state: Some(ReviewState::Pending),
            artifact_id: None,
        }
    }

    /// Returns true when the record satisfies the filter.
    #[must_use]
    pub fn matches(&self, record: &ReviewRecord) -> bool {
        self.state.is_none_or(|state| state == record.state)
            && self.artifact_id.as_ref().is_none_or(|id| *id == record.artifact_id)
    }
}
