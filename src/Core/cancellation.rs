// Cooperative cancellation shared between threads and handed into blocking
// waits. Wakers let a cancel interrupt an in-flight OS wait instead of being
// noticed on the next polling slice.
//
// Discipline for waiters: register the waker first, then check `is_cancelled`,
// then block. A cancel arriving between the check and the block still lands
// because the waker is already registered.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type Waker = Box<dyn Fn() + Send + Sync>;

struct TokenState {
    cancelled: AtomicBool,
    next_waker_id: AtomicU64,
    wakers: Mutex<Vec<(u64, Waker)>>,
}

/// A cloneable cancellation flag with waker callbacks.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                next_waker_id: AtomicU64::new(0),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Set the flag and invoke every registered waker. Idempotent; wakers
    /// run once per cancel call.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        let wakers = self.state.wakers.lock();
        for (_, wake) in wakers.iter() {
            wake();
        }
    }

    /// Register a callback invoked on cancel. The callback is removed when
    /// the returned guard drops.
    pub(crate) fn register<F>(&self, wake: F) -> WakerGuard
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.state.next_waker_id.fetch_add(1, Ordering::Relaxed);
        self.state.wakers.lock().push((id, Box::new(wake)));
        WakerGuard {
            state: Arc::clone(&self.state),
            id,
        }
    }
}

pub(crate) struct WakerGuard {
    state: Arc<TokenState>,
    id: u64,
}

impl Drop for WakerGuard {
    fn drop(&mut self) {
        self.state.wakers.lock().retain(|(id, _)| *id != self.id);
    }
}
