// crates/test-gate-core/src/core/time.rs
// ============================================================================
// Module: Test Gate Time Model
// Description: Canonical timestamp representations for reports and reviews.
// Purpose: Provide deterministic, replayable time values across gate records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Gate records embed explicit time values. Runtime components obtain them
//! from an injected [`Clock`](crate::interfaces::Clock) so tests can drive
//! review expiry and report timestamps with logical time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in gate reports and review records.
///
/// # Invariants
/// - Values are explicitly provided by a clock; records never read wall-clock time.
/// - Logical values are interpreted as milliseconds for expiry arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }

    /// Returns elapsed milliseconds from `earlier` to `self`.
    ///
    /// Returns `None` when the two timestamps use different time bases.
    /// Negative spans saturate to zero.
    #[must_use]
    pub fn millis_since(&self, earlier: &Self) -> Option<u64> {
        match (self, earlier) {
            (Self::UnixMillis(now), Self::UnixMillis(then)) => {
                Some(u64::try_from(now.saturating_sub(*then)).unwrap_or(0))
            }
            (Self::Logical(now), Self::Logical(then)) => Some(now.saturating_sub(*then)),
            _ => None,
        }
    }

    /// Returns a stable integer key used for ordering and identifier derivation.
    #[must_use]
    pub fn sort_key(&self) -> i128 {
        match self {
            Self::UnixMillis(value) => i128::from(*value),
            Self::Logical(value) => i128::from(*value),
        }
    }
}
