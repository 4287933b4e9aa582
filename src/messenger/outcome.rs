//! Write-once result cell shared by the racing completion triggers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// A slot that accepts at most one value.
///
/// The first `resolve` wins and delivers its value to the receiver returned
/// by [`OutcomeSlot::new`]; every later call is a no-op returning `false`.
#[derive(Debug)]
pub struct OutcomeSlot<T> {
    resolved: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> OutcomeSlot<T> {
    /// Create an empty slot and the receiver its value will arrive on.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            resolved: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        };
        (slot, rx)
    }

    /// Commit `value` if nothing has been committed yet.
    ///
    /// Returns `true` if this call won.
    pub fn resolve(&self, value: T) -> bool {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            // Receiver may already be gone if the caller was dropped
            let _ = tx.send(value);
        }
        true
    }

    /// Whether a value has been committed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}
