//! DMXP-Queue: a bounded, persistent, cross-process message queue backed by a
//! memory-mapped shared region.
//!
//! Unrelated OS processes exchange byte-string messages through a circular
//! buffer in shared memory, with no broker process. Publishers never block;
//! subscribers can poll, block with cancellation or a timeout, or await.
//! Blocking consumption is signaled by a cross-process wake primitive (a POSIX
//! named semaphore on Linux, a Unix-socket emulation elsewhere).
//!
//! ```no_run
//! use dmxp_queue::{CancellationToken, QueueBuilder};
//!
//! # fn main() -> Result<(), dmxp_queue::QueueError> {
//! let publisher = QueueBuilder::new("events")
//!     .with_capacity(1024 * 1024)
//!     .create_publisher()?;
//! publisher.try_enqueue(b"hello");
//!
//! let subscriber = QueueBuilder::new("events").create_subscriber()?;
//! let mut message = Vec::new();
//! subscriber.dequeue(&mut message, &CancellationToken::new())?;
//! # Ok(())
//! # }
//! ```

// Module naming follows project convention.
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Queue;

pub use Core::cancellation::CancellationToken;
pub use Core::errors::{QueueError, QueueResult};
pub use Core::semaphore::{SignalBackend, WaitOutcome};
pub use Queue::{Publisher, QueueBuilder, QueueOptions, Subscriber};
