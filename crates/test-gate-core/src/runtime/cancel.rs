// crates/test-gate-core/src/runtime/cancel.rs
// ============================================================================
// Module: Test Gate Cancellation
// Description: Batch-level cancellation signal shared by all workers.
// Purpose: Let one caller stop in-flight and pending evaluations.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! A [`CancelHandle`] owns a `watch` channel; every [`CancelSignal`] cloned
//! from it observes the same flag. Cancellation is one-way: once raised it
//! stays raised.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::watch;

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Owner side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    /// Shared sender; the flag flips from `false` to `true` once.
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Creates a handle with the flag lowered.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raises the cancellation flag.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns a signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    /// Returns true when the flag is raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Observer side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Receiver; `None` for a signal that can never fire.
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Returns a signal that is never raised.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            receiver: None,
        }
    }

    /// Returns true when cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|receiver| *receiver.borrow())
    }

    /// Completes once cancellation is requested.
    ///
    /// Never completes when the handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        let Some(receiver) = self.receiver.as_mut() else {
            std::future::pending::<()>().await;
            return;
        };
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
