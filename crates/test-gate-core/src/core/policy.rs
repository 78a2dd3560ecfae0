// crates/test-gate-core/src/core/policy.rs
// ============================================================================
// Module: Test Gate Policy Types
// Description: Policy violations, severities, and quality scores.
// Purpose: Provide the serializable output of static policy checks.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Policy types carry the result of checking one artifact. Violations are the
//! authoritative gate; the quality score is advisory and is forced to zero
//! whenever a blocking violation is present.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Rule identifier reported when the artifact cannot be tokenized.
pub const UNPARSEABLE_RULE_ID: &str = "unparseable";

/// Decimal places kept when rounding quality scores.
const SCORE_SCALE: f64 = 10_000.0;

// ============================================================================
// SECTION: Severity and Category
// ============================================================================

/// Severity of a policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Makes the artifact ineligible regardless of score.
    Block,
    /// Routes the artifact to human review.
    Warn,
    /// Informational marker; never affects the verdict.
    Info,
}

impl Severity {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

/// Category a policy rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Nondeterministic behavior (randomness, timing, network).
    Determinism,
    /// Side effects outside the test (filesystem, processes, globals).
    Isolation,
    /// Weak, missing, or swallowed assertions.
    AssertionQuality,
    /// Shape of test units (naming, length, fixture symmetry).
    Structural,
    /// Source text that cannot be tokenized.
    Syntax,
    /// Operator-configured rules.
    Custom,
}

// ============================================================================
// SECTION: Violations
// ============================================================================

/// Source location of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// Applies to the whole artifact.
    File,
    /// One-based line number.
    Line {
        /// Line number.
        line: usize,
    },
}

impl Location {
    /// Returns the line number when line-located.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::File => None,
            Self::Line {
                line,
            } => Some(*line),
        }
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Location {
    /// Ordering rank: file-level findings sort before line findings.
    const fn rank(&self) -> (u8, usize) {
        match self {
            Self::File => (0, 0),
            Self::Line {
                line,
            } => (1, *line),
        }
    }
}

/// Single policy finding against an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// Rule that produced the finding.
    pub rule_id: RuleId,
    /// Rule category.
    pub category: RuleCategory,
    /// Finding severity.
    pub severity: Severity,
    /// Where the finding applies.
    pub location: Location,
    /// Human-readable description.
    pub message: String,
    /// Trimmed source line for line-located findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl PolicyViolation {
    /// Returns true when the violation blocks the artifact.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Block
    }

    /// Ordering key: location, then rule id, then message.
    #[must_use]
    pub fn sort_key(&self) -> (Location, &str, &str) {
        (self.location, self.rule_id.as_str(), self.message.as_str())
    }
}

// ============================================================================
// SECTION: Quality Score
// ============================================================================

/// Sub-signals feeding the weighted quality score. Each value lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityBreakdown {
    /// Test name clarity.
    pub naming: f64,
    /// Assertion specificity.
    pub assertion: f64,
    /// Isolation hygiene (fixture symmetry, no swallowed errors).
    pub isolation: f64,
    /// Breadth of edge-case coverage signals.
    pub edge_cases: f64,
    /// Fraction of documented test units.
    pub documentation: f64,
}

/// Result of checking one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Ordered violations.
    pub violations: Vec<PolicyViolation>,
    /// Weighted quality score in `[0, 1]`, rounded to four decimals.
    pub score: f64,
    /// Sub-signals behind the score.
    pub breakdown: QualityBreakdown,
}

impl PolicyOutcome {
    /// Returns true when any violation blocks the artifact.
    #[must_use]
    pub fn has_block(&self) -> bool {
        self.violations.iter().any(PolicyViolation::is_blocking)
    }

    /// Returns true when any warn-level violation is present.
    #[must_use]
    pub fn has_warn(&self) -> bool {
        self.violations.iter().any(|violation| violation.severity == Severity::Warn)
    }

    /// Returns the first blocking violation, if any.
    #[must_use]
    pub fn first_block(&self) -> Option<&PolicyViolation> {
        self.violations.iter().find(|violation| violation.is_blocking())
    }
}

/// Clamps a score into `[0, 1]` and rounds it to four decimal places.
#[must_use]
pub fn round_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * SCORE_SCALE).round() / SCORE_SCALE
}
