// POSIX named-semaphore wake primitive.
//
// One kernel object per queue identifier; any number of processes open it by
// name. `release` posts, `wait` does a timed wait. The semaphore is never
// unlinked: POSIX named semaphores persist until reboot, matching the queue
// region file's own persistence, and unlinking on drop would detach live
// peers from each other.

use crate::Core::cancellation::CancellationToken;
use crate::Core::identity::QueueIdentifier;
use crate::Core::semaphore::{SemaphoreReleaser, SemaphoreWaiter, WaitOutcome};
use std::ffi::CString;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SemHandle {
    sem: *mut libc::sem_t,
}

// The handle is a process-wide kernel object reference; libc semaphore calls
// are thread-safe on the same sem_t.
unsafe impl Send for SemHandle {}
unsafe impl Sync for SemHandle {}

impl SemHandle {
    fn post(&self) {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            tracing::warn!(
                error = %io::Error::last_os_error(),
                "sem_post failed"
            );
        }
    }
}

impl Drop for SemHandle {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

/// Named semaphore opened (creating if absent) under the identifier's name.
/// Implements both roles; publisher and subscriber construct their own handle.
pub struct NamedSemaphore {
    handle: Arc<SemHandle>,
    name: String,
}

impl NamedSemaphore {
    pub fn open(identifier: &QueueIdentifier) -> io::Result<NamedSemaphore> {
        let name = identifier.semaphore_name();
        let c_name = CString::new(name.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in semaphore name"))?;

        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o600 as libc::mode_t,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }

        tracing::debug!(name = %name, "opened named semaphore");
        Ok(NamedSemaphore {
            handle: Arc::new(SemHandle { sem }),
            name,
        })
    }
}

impl SemaphoreWaiter for NamedSemaphore {
    fn wait(&self, timeout: Duration, token: &CancellationToken) -> WaitOutcome {
        // Register first so a cancel between the flag check and the OS wait
        // still posts the semaphore and interrupts us.
        let waker_handle = Arc::clone(&self.handle);
        let _guard = token.register(move || waker_handle.post());
        if token.is_cancelled() {
            return WaitOutcome::Cancelled;
        }

        let deadline = Instant::now().checked_add(timeout);

        #[cfg(target_os = "linux")]
        loop {
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) => remaining,
                    None => return WaitOutcome::TimedOut,
                },
                // Effectively unbounded; wait in long slices.
                None => Duration::from_secs(3600),
            };

            let mut now = libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
                tracing::warn!(
                    error = %io::Error::last_os_error(),
                    "clock_gettime failed"
                );
                return WaitOutcome::TimedOut;
            }
            let mut abs = libc::timespec {
                tv_sec: now.tv_sec + remaining.as_secs() as libc::time_t,
                tv_nsec: now.tv_nsec + remaining.subsec_nanos() as libc::c_long,
            };
            if abs.tv_nsec >= 1_000_000_000 {
                abs.tv_sec += 1;
                abs.tv_nsec -= 1_000_000_000;
            }

            let rc = unsafe { libc::sem_timedwait(self.handle.sem, &abs) };
            if rc == 0 {
                if token.is_cancelled() {
                    return WaitOutcome::Cancelled;
                }
                return WaitOutcome::Signaled;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => {
                    return if token.is_cancelled() {
                        WaitOutcome::Cancelled
                    } else {
                        WaitOutcome::TimedOut
                    };
                }
                Some(libc::EINTR) => continue,
                _ => {
                    tracing::warn!(name = %self.name, error = %err, "sem_timedwait failed");
                    return WaitOutcome::TimedOut;
                }
            }
        }

        // No portable sem_timedwait outside Linux; poll the semaphore in
        // short slices instead.
        #[cfg(not(target_os = "linux"))]
        loop {
            if token.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let rc = unsafe { libc::sem_trywait(self.handle.sem) };
            if rc == 0 {
                if token.is_cancelled() {
                    return WaitOutcome::Cancelled;
                }
                return WaitOutcome::Signaled;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => {}
                _ => {
                    tracing::warn!(name = %self.name, error = %err, "sem_trywait failed");
                    return WaitOutcome::TimedOut;
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return WaitOutcome::TimedOut;
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn wake(&self) {
        self.handle.post();
    }
}

impl SemaphoreReleaser for NamedSemaphore {
    fn release(&self) {
        self.handle.post();
    }
}
