// A queue is identified by (name, root directory). Every OS-visible name the
// crate uses is derived here, so two processes agreeing on the pair rendezvous
// on the same region file, the same named semaphore, and the same socket
// directory without further coordination.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueIdentifier {
    name: String,
    root: PathBuf,
}

impl QueueIdentifier {
    /// `root` must already be canonicalized by the caller so that different
    /// spellings of the same directory derive the same semaphore name.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> QueueIdentifier {
        QueueIdentifier {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the memory-mapped region file.
    pub fn region_path(&self) -> PathBuf {
        self.root.join(format!("{}.dq", self.name))
    }

    /// Directory holding the socket-emulation rendezvous endpoints.
    pub fn semaphore_dir(&self) -> PathBuf {
        self.root.join(".dmxp.sem").join(&self.name)
    }

    /// POSIX named-semaphore name for this queue.
    ///
    /// Semaphore names live in a single flat system namespace with a tight
    /// length limit, so the (root, name) pair is hashed rather than encoded.
    pub fn semaphore_name(&self) -> String {
        let mut hasher = Sha256::new();
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            hasher.update(self.root.as_os_str().as_bytes());
        }
        #[cfg(not(unix))]
        hasher.update(self.root.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.name.as_bytes());
        let digest = hasher.finalize();

        let mut out = String::with_capacity(6 + 24);
        out.push_str("/dmxp.");
        for byte in &digest[..12] {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}
