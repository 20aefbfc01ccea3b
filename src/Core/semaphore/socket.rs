// Wake primitive emulated over Unix datagram sockets, for platforms without
// a usable named semaphore.
//
// Each waiter binds a datagram socket inside the identifier's semaphore
// directory; a releaser watches that directory and broadcasts a one-byte
// datagram to every live endpoint. Every blocked waiter may wake per release;
// the ring's read-offset CAS decides who actually gets the message, so the
// herd costs a retry, not correctness.

use crate::Core::cancellation::CancellationToken;
use crate::Core::identity::QueueIdentifier;
use crate::Core::semaphore::{SemaphoreReleaser, SemaphoreWaiter, WaitOutcome};
use crate::Core::watcher::{DirEvent, DirWatcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

// Distinguishes endpoints bound by the same process.
static NEXT_ENDPOINT: AtomicU32 = AtomicU32::new(0);

fn is_endpoint(path: &PathBuf) -> bool {
    path.extension().is_some_and(|ext| ext == "sock")
}

/// A waiter endpoint. A received datagram is a wake; its payload is ignored.
pub struct SocketWaiter {
    socket: UnixDatagram,
    path: PathBuf,
}

impl SocketWaiter {
    pub fn bind(identifier: &QueueIdentifier) -> io::Result<SocketWaiter> {
        let dir = identifier.semaphore_dir();
        std::fs::create_dir_all(&dir)?;

        let seq = NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{}.{seq}.sock", std::process::id()));
        // A stale file can survive a crashed process reusing our pid.
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let socket = UnixDatagram::bind(&path)?;

        tracing::debug!(path = %path.display(), "bound waiter endpoint");
        Ok(SocketWaiter { socket, path })
    }

    // Self-directed datagram; the blocked recv in `wait` picks it up.
    fn poke(path: &PathBuf) {
        let sender = match UnixDatagram::unbound() {
            Ok(sender) => sender,
            Err(_) => return,
        };
        let _ = sender.send_to(&[1u8], path);
    }
}

impl SemaphoreWaiter for SocketWaiter {
    fn wait(&self, timeout: Duration, token: &CancellationToken) -> WaitOutcome {
        let waker_path = self.path.clone();
        let _guard = token.register(move || SocketWaiter::poke(&waker_path));
        if token.is_cancelled() {
            return WaitOutcome::Cancelled;
        }

        let deadline = Instant::now().checked_add(timeout);
        let mut buf = [0u8; 8];
        loop {
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return WaitOutcome::TimedOut,
                },
                None => Duration::from_secs(3600),
            };
            if self.socket.set_read_timeout(Some(remaining)).is_err() {
                return WaitOutcome::TimedOut;
            }

            match self.socket.recv(&mut buf) {
                Ok(_) => {
                    return if token.is_cancelled() {
                        WaitOutcome::Cancelled
                    } else {
                        WaitOutcome::Signaled
                    };
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    if token.is_cancelled() {
                        return WaitOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "waiter recv failed");
                    return WaitOutcome::TimedOut;
                }
            }
        }
    }

    fn wake(&self) {
        SocketWaiter::poke(&self.path);
    }
}

impl Drop for SocketWaiter {
    fn drop(&mut self) {
        // Unregisters this endpoint; releasers observe the removal and prune.
        let _ = std::fs::remove_file(&self.path);
        tracing::debug!(path = %self.path.display(), "removed waiter endpoint");
    }
}

/// A releaser maintaining the live peer set by watching the semaphore
/// directory and broadcasting to it on each release.
pub struct SocketReleaser {
    socket: UnixDatagram,
    watcher: DirWatcher,
    peers: Mutex<HashSet<PathBuf>>,
}

impl SocketReleaser {
    pub fn open(identifier: &QueueIdentifier) -> io::Result<SocketReleaser> {
        let dir = identifier.semaphore_dir();
        std::fs::create_dir_all(&dir)?;

        // Watch before scanning: an endpoint bound between the scan and the
        // watch would otherwise never be discovered.
        let watcher = DirWatcher::new(&dir)?;
        let mut peers = HashSet::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if is_endpoint(&path) {
                peers.insert(path);
            }
        }

        let socket = UnixDatagram::unbound()?;
        socket.set_nonblocking(true)?;

        tracing::debug!(dir = %dir.display(), peers = peers.len(), "opened releaser");
        Ok(SocketReleaser {
            socket,
            watcher,
            peers: Mutex::new(peers),
        })
    }

    fn sync_peers(&self, peers: &mut HashSet<PathBuf>) {
        for event in self.watcher.poll_events() {
            match event {
                DirEvent::Created(path) if is_endpoint(&path) => {
                    tracing::debug!(path = %path.display(), "peer registered");
                    peers.insert(path);
                }
                DirEvent::Removed(path) => {
                    if peers.remove(&path) {
                        tracing::debug!(path = %path.display(), "peer unregistered");
                    }
                }
                _ => {}
            }
        }
    }
}

impl SemaphoreReleaser for SocketReleaser {
    fn release(&self) {
        let mut peers = self.peers.lock();
        self.sync_peers(&mut peers);

        peers.retain(|path| match self.socket.send_to(&[1u8], path) {
            Ok(_) => true,
            // A full receive buffer means the waiter already holds an
            // undelivered permit; keep it.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                ) =>
            {
                tracing::debug!(path = %path.display(), "pruned dead peer");
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "wake send failed");
                true
            }
        });
    }
}
