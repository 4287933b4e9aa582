//! Bookkeeping of in-flight calls, used only for orderly shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registry of live calls and their cancellation tokens.
///
/// Once closed, every later registration receives an already cancelled token.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Mutex<Calls>,
}

#[derive(Debug, Default)]
struct Calls {
    closed: bool,
    live: HashMap<Uuid, CancellationToken>,
}

impl CallRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new call. The entry is removed when the returned guard drops.
    #[must_use]
    pub fn register(self: &Arc<Self>) -> Registration {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        let mut calls = self.calls();
        if calls.closed {
            token.cancel();
        }
        calls.live.insert(id, token.clone());
        drop(calls);

        Registration {
            id,
            token,
            registry: Arc::clone(self),
        }
    }

    /// Number of live calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls().live.len()
    }

    /// Whether no call is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls().live.is_empty()
    }

    /// Whether [`CallRegistry::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.calls().closed
    }

    /// Cancel every live call and refuse new ones. Returns how many were
    /// signalled.
    pub fn close(&self) -> usize {
        let mut calls = self.calls();
        calls.closed = true;
        for token in calls.live.values() {
            token.cancel();
        }
        calls.live.len()
    }
}

/// Membership of one call in a [`CallRegistry`].
#[derive(Debug)]
pub struct Registration {
    id: Uuid,
    token: CancellationToken,
    registry: Arc<CallRegistry>,
}

impl Registration {
    /// Identifier of the call, used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token cancelled when the registry shuts down.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.calls().live.remove(&self.id);
    }
}
