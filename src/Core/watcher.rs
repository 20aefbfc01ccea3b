// Directory watch used by the socket-emulated wake primitive to discover
// rendezvous endpoints as peer processes create and remove them.
//
// Linux gets a real inotify watch through raw libc calls; other Unix flavors
// fall back to snapshot diffing, which is slower but only runs on the
// release() path.

use std::path::PathBuf;

/// One change observed inside the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

#[cfg(target_os = "linux")]
pub use self::inotify::DirWatcher;

#[cfg(all(unix, not(target_os = "linux")))]
pub use self::polling::DirWatcher;

#[cfg(target_os = "linux")]
mod inotify {
    use super::DirEvent;
    use std::ffi::CString;
    use std::io;
    use std::mem::size_of;
    use std::os::unix::ffi::{OsStrExt, OsStringExt};
    use std::path::{Path, PathBuf};

    // Large enough for a burst of events; inotify never splits one event
    // across reads.
    #[repr(align(8))]
    struct EventBuf([u8; 4096]);

    /// A non-blocking watch over one directory. `poll_events` drains whatever
    /// accumulated since the previous call, so the event sequence is lazy and
    /// unbounded without a background thread.
    pub struct DirWatcher {
        fd: libc::c_int,
        dir: PathBuf,
    }

    impl DirWatcher {
        pub fn new(dir: &Path) -> io::Result<DirWatcher> {
            let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }

            let c_dir = CString::new(dir.as_os_str().as_bytes())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in watch path"))?;
            let mask = libc::IN_CREATE | libc::IN_DELETE | libc::IN_MOVED_TO | libc::IN_MOVED_FROM;
            let wd = unsafe { libc::inotify_add_watch(fd, c_dir.as_ptr(), mask) };
            if wd < 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err);
            }

            Ok(DirWatcher {
                fd,
                dir: dir.to_path_buf(),
            })
        }

        /// Drain all pending events. Never blocks.
        pub fn poll_events(&self) -> Vec<DirEvent> {
            let mut events = Vec::new();
            let mut buf = EventBuf([0u8; 4096]);

            loop {
                let n = unsafe {
                    libc::read(
                        self.fd,
                        buf.0.as_mut_ptr() as *mut libc::c_void,
                        buf.0.len(),
                    )
                };
                if n < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    // WouldBlock: nothing pending.
                    break;
                }
                if n == 0 {
                    break;
                }

                let n = n as usize;
                let mut at = 0usize;
                while at + size_of::<libc::inotify_event>() <= n {
                    let event =
                        unsafe { &*(buf.0.as_ptr().add(at) as *const libc::inotify_event) };
                    let name_at = at + size_of::<libc::inotify_event>();
                    let name_len = event.len as usize;
                    if name_at + name_len > n {
                        break;
                    }
                    if name_len > 0 {
                        let raw = &buf.0[name_at..name_at + name_len];
                        let end = raw.iter().position(|&b| b == 0).unwrap_or(name_len);
                        let name =
                            std::ffi::OsString::from_vec(raw[..end].to_vec());
                        let path = self.dir.join(name);
                        if event.mask & (libc::IN_CREATE | libc::IN_MOVED_TO) != 0 {
                            events.push(DirEvent::Created(path));
                        } else if event.mask & (libc::IN_DELETE | libc::IN_MOVED_FROM) != 0 {
                            events.push(DirEvent::Removed(path));
                        }
                    }
                    at = name_at + name_len;
                }
            }

            events
        }
    }

    impl Drop for DirWatcher {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.fd);
            }
        }
    }

    unsafe impl Send for DirWatcher {}
    unsafe impl Sync for DirWatcher {}
}

#[cfg(all(unix, not(target_os = "linux")))]
mod polling {
    use super::DirEvent;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::io;
    use std::path::{Path, PathBuf};

    /// Snapshot-diffing fallback for Unix systems without inotify.
    pub struct DirWatcher {
        dir: PathBuf,
        seen: Mutex<HashSet<PathBuf>>,
    }

    impl DirWatcher {
        pub fn new(dir: &Path) -> io::Result<DirWatcher> {
            let watcher = DirWatcher {
                dir: dir.to_path_buf(),
                seen: Mutex::new(HashSet::new()),
            };
            // Prime the snapshot so only future changes become events.
            *watcher.seen.lock() = watcher.list();
            Ok(watcher)
        }

        fn list(&self) -> HashSet<PathBuf> {
            match std::fs::read_dir(&self.dir) {
                Ok(entries) => entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .collect(),
                Err(_) => HashSet::new(),
            }
        }

        pub fn poll_events(&self) -> Vec<DirEvent> {
            let current = self.list();
            let mut seen = self.seen.lock();
            let mut events = Vec::new();
            for path in current.difference(&seen) {
                events.push(DirEvent::Created(path.clone()));
            }
            for path in seen.difference(&current) {
                events.push(DirEvent::Removed(path.clone()));
            }
            *seen = current;
            events
        }
    }
}
