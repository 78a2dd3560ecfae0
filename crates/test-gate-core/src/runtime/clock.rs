// crates/test-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Test Gate Clocks
// Description: Wall-clock and controllable clock implementations.
// Purpose: Supply timestamps to runtime components through the Clock seam.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads unix milliseconds. [`ManualClock`] returns logical
//! time that callers advance explicitly, which keeps review expiry and run
//! identifiers reproducible in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Clock backed by the host wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Logical clock advanced by the caller.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current logical time in milliseconds.
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub const fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Advances the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute logical time.
    pub fn set(&self, value: u64) {
        self.now.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::Logical(self.now.load(Ordering::SeqCst))
    }
}
