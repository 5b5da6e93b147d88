//! Single-flight latch for the primary orchestrated request.
//!
//! A [`ConcurrencyGuard`] holds at most one [`GuardPermit`] at a time. Each
//! permit carries a fresh token; dropping the permit frees the slot only if
//! the slot still holds that token, so a permit that outlives a session reset
//! cannot free a slot that a newer request has since claimed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

const FREE: u64 = 0;

#[derive(Debug, Default)]
struct GuardInner {
    slot: AtomicU64,
    next_token: AtomicU64,
}

/// Debounce for duplicate user-triggered submissions. Not a queue: a failed
/// acquire means the request is dropped.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGuard {
    inner: Arc<GuardInner>,
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot, or returns `None` without side effects if it is taken.
    pub fn try_acquire(&self) -> Option<GuardPermit> {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .slot
            .compare_exchange(FREE, token, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                trace!(token, "Guard acquired");
                GuardPermit {
                    inner: self.inner.clone(),
                    token,
                }
            })
    }

    pub fn is_held(&self) -> bool {
        self.inner.slot.load(Ordering::Acquire) != FREE
    }

    /// Frees the slot unconditionally. Used when the owning session is discarded.
    pub fn reset(&self) {
        self.inner.slot.store(FREE, Ordering::Release);
    }
}

/// Proof of holding the guard. Released exactly once, on drop.
#[derive(Debug)]
pub struct GuardPermit {
    inner: Arc<GuardInner>,
    token: u64,
}

impl GuardPermit {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Explicit release; equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        let released = self
            .inner
            .slot
            .compare_exchange(self.token, FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        trace!(token = self.token, released, "Guard permit dropped");
    }
}
