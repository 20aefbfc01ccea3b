//! Cross-process wake primitive with waiter and releaser roles.
//!
//! A publisher holds a releaser, a subscriber holds a waiter; both are named
//! by the queue identifier so unrelated processes rendezvous through the OS.
//! Two implementations sit behind the same seam:
//!
//! - [`named`]: a POSIX named semaphore, used where the platform offers one
//!   with a usable timed wait (Linux).
//! - [`socket`]: an emulation over Unix datagram sockets plus a directory
//!   watch, for platforms without usable named semaphores. A release there is
//!   a broadcast to every registered waiter; the ring's read-offset CAS, not
//!   the wake primitive, is what keeps a message from being consumed twice.
//!
//! The variant is an explicit construction-time choice, never an ambient
//! platform lookup at call sites.

#[cfg(unix)]
pub mod named;
#[cfg(unix)]
pub mod socket;

use crate::Core::cancellation::CancellationToken;
use crate::Core::identity::QueueIdentifier;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// How a wait call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Cancelled,
}

/// Which wake implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalBackend {
    /// Named semaphore where the platform has a usable one, sockets elsewhere.
    #[default]
    Auto,
    NamedSemaphore,
    Sockets,
}

#[cfg(unix)]
enum ResolvedBackend {
    Named,
    Sockets,
}

#[cfg(unix)]
impl SignalBackend {
    fn resolve(self) -> ResolvedBackend {
        match self {
            SignalBackend::NamedSemaphore => ResolvedBackend::Named,
            SignalBackend::Sockets => ResolvedBackend::Sockets,
            SignalBackend::Auto => {
                if cfg!(target_os = "linux") {
                    ResolvedBackend::Named
                } else {
                    ResolvedBackend::Sockets
                }
            }
        }
    }
}

/// The blocking side of the wake primitive.
pub trait SemaphoreWaiter: Send + Sync {
    /// Block until released, the timeout elapses, or the token is cancelled.
    ///
    /// Implementations register a cancellation waker before checking the
    /// token and blocking, so a cancel always interrupts the wait promptly.
    fn wait(&self, timeout: Duration, token: &CancellationToken) -> WaitOutcome;

    /// Wake this waiter only. Used by disposal plumbing to unblock an
    /// in-flight wait; a resulting spurious wakeup is harmless because
    /// callers re-check their condition.
    fn wake(&self);
}

/// The signaling side of the wake primitive.
pub trait SemaphoreReleaser: Send + Sync {
    /// Wake at least one waiter registered under the same identifier. If no
    /// waiter is blocked the signal need not be remembered beyond what avoids
    /// a missed-wakeup race.
    fn release(&self);
}

#[cfg(unix)]
pub fn create_waiter(
    identifier: &QueueIdentifier,
    backend: SignalBackend,
) -> io::Result<Arc<dyn SemaphoreWaiter>> {
    match backend.resolve() {
        ResolvedBackend::Named => Ok(Arc::new(named::NamedSemaphore::open(identifier)?)),
        ResolvedBackend::Sockets => Ok(Arc::new(socket::SocketWaiter::bind(identifier)?)),
    }
}

#[cfg(unix)]
pub fn create_releaser(
    identifier: &QueueIdentifier,
    backend: SignalBackend,
) -> io::Result<Box<dyn SemaphoreReleaser>> {
    match backend.resolve() {
        ResolvedBackend::Named => Ok(Box::new(named::NamedSemaphore::open(identifier)?)),
        ResolvedBackend::Sockets => Ok(Box::new(socket::SocketReleaser::open(identifier)?)),
    }
}

#[cfg(not(unix))]
pub fn create_waiter(
    _identifier: &QueueIdentifier,
    _backend: SignalBackend,
) -> io::Result<Arc<dyn SemaphoreWaiter>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "cross-process wake primitives are only supported on Unix",
    ))
}

#[cfg(not(unix))]
pub fn create_releaser(
    _identifier: &QueueIdentifier,
    _backend: SignalBackend,
) -> io::Result<Box<dyn SemaphoreReleaser>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "cross-process wake primitives are only supported on Unix",
    ))
}
