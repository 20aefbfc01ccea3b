use crate::Core::semaphore::SemaphoreReleaser;
use crate::Queue::SharedQueue;

/// The writing role of a queue. Never blocks.
///
/// Cheap to share across threads behind an `Arc`; enqueues from any number
/// of threads and processes interleave safely. Dropping a publisher releases
/// its wake role and mapping; messages already written stay in the region
/// for other handles.
pub struct Publisher {
    name: String,
    queue: SharedQueue,
    releaser: Box<dyn SemaphoreReleaser>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Publisher {
    pub(crate) fn new(
        name: String,
        queue: SharedQueue,
        releaser: Box<dyn SemaphoreReleaser>,
    ) -> Publisher {
        Publisher {
            name,
            queue,
            releaser,
        }
    }

    /// Append one message and wake waiting subscribers. Returns `false` when
    /// the ring lacks room; the caller decides whether to retry, drop, or
    /// back off. Internal failures are logged and reported as `false`.
    pub fn try_enqueue(&self, message: &[u8]) -> bool {
        match self.queue.ring.try_append(message) {
            Ok(true) => {
                self.releaser.release();
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!(queue = %self.name, error = %e, "enqueue failed");
                false
            }
        }
    }

    /// Ring payload capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.queue.ring.capacity()
    }
}
