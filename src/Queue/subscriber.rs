use crate::Core::cancellation::CancellationToken;
use crate::Core::errors::{QueueError, QueueResult};
use crate::Core::semaphore::SemaphoreWaiter;
use crate::Queue::SharedQueue;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Blocking waits run in bounded slices so disposal and external cancellation
// are observed even if a wake is lost.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// The reading role of a queue.
///
/// One non-blocking probe (`try_dequeue`), a blocking loop with cancellation
/// (`dequeue`) or a timeout (`dequeue_timeout`), and an async variant
/// (`dequeue_async`). All return `Ok(false)` instead of hanging when
/// cancelled or disposed.
///
/// `close` cancels the subscriber's disposal token, so a wait blocked on
/// another thread returns promptly; `Drop` does the same. Operations after
/// disposal report an empty queue.
pub struct Subscriber {
    name: String,
    queue: SharedQueue,
    waiter: Arc<dyn SemaphoreWaiter>,
    disposal: CancellationToken,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Subscriber {
    pub(crate) fn new(
        name: String,
        queue: SharedQueue,
        waiter: Arc<dyn SemaphoreWaiter>,
    ) -> Subscriber {
        Subscriber {
            name,
            queue,
            waiter,
            disposal: CancellationToken::new(),
        }
    }

    /// One non-blocking attempt. `Ok(false)` when the queue is empty, the
    /// head frame is still being written, or this subscriber is disposed.
    pub fn try_dequeue(&self, sink: &mut Vec<u8>) -> QueueResult<bool> {
        if self.disposal.is_cancelled() {
            return Ok(false);
        }
        self.queue.ring.try_consume(sink)
    }

    /// Block until a message arrives, the token cancels, or the subscriber
    /// is disposed. `Ok(false)` only in the latter two cases.
    pub fn dequeue(&self, sink: &mut Vec<u8>, token: &CancellationToken) -> QueueResult<bool> {
        loop {
            if self.try_dequeue(sink)? {
                return Ok(true);
            }
            if token.is_cancelled() || self.disposal.is_cancelled() {
                return Ok(false);
            }
            self.wait_slice(WAIT_SLICE, token);
        }
    }

    /// Like `dequeue` bounded by `timeout`. `Ok(false)` once the deadline
    /// passes without a message.
    pub fn dequeue_timeout(&self, sink: &mut Vec<u8>, timeout: Duration) -> QueueResult<bool> {
        let deadline = Instant::now().checked_add(timeout);
        let token = CancellationToken::new();
        loop {
            if self.try_dequeue(sink)? {
                return Ok(true);
            }
            if self.disposal.is_cancelled() {
                return Ok(false);
            }
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return Ok(false),
                },
                None => WAIT_SLICE,
            };
            self.wait_slice(remaining.min(WAIT_SLICE), &token);
        }
    }

    /// `dequeue` for async callers. The blocking wait runs on
    /// `tokio::task::spawn_blocking`, so the carrier thread is never tied up.
    pub async fn dequeue_async(
        &self,
        sink: &mut Vec<u8>,
        token: &CancellationToken,
    ) -> QueueResult<bool> {
        loop {
            if self.try_dequeue(sink)? {
                return Ok(true);
            }
            if token.is_cancelled() || self.disposal.is_cancelled() {
                return Ok(false);
            }

            let waiter = Arc::clone(&self.waiter);
            let disposal = self.disposal.clone();
            let token = token.clone();
            tokio::task::spawn_blocking(move || {
                let guard_waiter = Arc::clone(&waiter);
                let _guard = disposal.register(move || guard_waiter.wake());
                if disposal.is_cancelled() {
                    return;
                }
                let _ = waiter.wait(WAIT_SLICE, &token);
            })
            .await
            .map_err(|e| QueueError::Signal(io::Error::other(e)))?;
        }
    }

    // One bounded wait that both the caller's token and the disposal token
    // can interrupt.
    fn wait_slice(&self, timeout: Duration, token: &CancellationToken) {
        let disposal_waiter = Arc::clone(&self.waiter);
        let _guard = self.disposal.register(move || disposal_waiter.wake());
        if self.disposal.is_cancelled() {
            return;
        }
        // The outcome does not matter here; every path re-checks the ring
        // and both tokens.
        let _ = self.waiter.wait(timeout, token);
    }

    /// Dispose this subscriber: any wait blocked on another thread returns
    /// promptly with `Ok(false)`, and later operations report empty.
    pub fn close(&self) {
        self.disposal.cancel();
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.disposal.cancel();
        tracing::debug!(queue = %self.name, "subscriber disposed");
    }
}
