use std::io;
use thiserror::Error;

/// Failures surfaced by queue handles.
///
/// `Corrupted` means a shared-region invariant no longer holds (a frame
/// length exceeding capacity, an uninitialized header). It is fatal for the
/// handle; the backing file should be recreated with `create_or_override`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),

    #[error("shared memory operation failed")]
    Memory(#[source] io::Error),

    #[error("wake primitive operation failed")]
    Signal(#[source] io::Error),

    #[error("shared region is corrupted: {0}")]
    Corrupted(&'static str),
}

pub type QueueResult<T> = Result<T, QueueError>;
