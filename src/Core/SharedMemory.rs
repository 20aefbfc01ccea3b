// Memory-mapped shared region backing one queue.
// The region is a plain file under the identifier's root, mapped with
// mmap(MAP_SHARED) so every process opening the same path observes the same
// bytes. Dropping a view unmaps but never deletes the backing file; the
// queue outlives any single process by design.

use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

#[cfg(unix)]
use std::fs::OpenOptions;
#[cfg(unix)]
use std::os::fd::AsRawFd;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// An owned mapping of one queue's shared region.
pub struct MemoryView {
    ptr: NonNull<u8>,
    len: usize,
    path: PathBuf,
    created: bool,
}

unsafe impl Send for MemoryView {}
unsafe impl Sync for MemoryView {}

#[cfg(unix)]
impl MemoryView {
    /// Open or create the shared region at `path`, exactly `size` bytes.
    ///
    /// The first opener creates and zero-fills the file; later openers attach
    /// to it and are rejected if its size does not match (incompatible
    /// capacities are never silently reinterpreted). With
    /// `create_or_override` any existing file is unlinked first, so handles
    /// from a previous session keep their own mapping while new handles start
    /// from a fresh region.
    pub fn open(path: &Path, size: usize, create_or_override: bool) -> io::Result<MemoryView> {
        if create_or_override {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        // Try to create first; lose the race gracefully and attach instead.
        let (file, created) = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
        {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let file = OpenOptions::new().read(true).write(true).open(path)?;
                (file, false)
            }
            Err(e) => return Err(e),
        };

        if created {
            if unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                let _ = std::fs::remove_file(path);
                return Err(err);
            }
        } else {
            let file_len = file.metadata()?.len();
            if file_len != size as u64 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "shared region size mismatch at {}: expected {size} bytes, found {file_len}",
                        path.display()
                    ),
                ));
            }
        }

        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            if created {
                let _ = std::fs::remove_file(path);
            }
            return Err(err);
        }
        // The mapping stays valid after `file` closes at the end of this call.
        let ptr = NonNull::new(raw as *mut u8)
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;

        tracing::debug!(
            path = %path.display(),
            size,
            created,
            "mapped shared region"
        );

        Ok(MemoryView {
            ptr,
            len: size,
            path: path.to_owned(),
            created,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this call created (and zero-filled) the backing file.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for MemoryView {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

#[cfg(not(unix))]
impl MemoryView {
    pub fn open(_path: &Path, _size: usize, _create_or_override: bool) -> io::Result<MemoryView> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "shared memory queues are only supported on Unix",
        ))
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
