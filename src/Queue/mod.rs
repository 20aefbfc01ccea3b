pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;

    pub use Buffer::RingView;
    pub use Buffer_impl::{advance_offset, align8, fold_span, offset_distance, OFFSET_FOLD_AT};
    pub use layout::{
        queue_header_size, FrameHeader, QueueHeader, FRAME_HEADER_SIZE, QUEUE_MAGIC, QUEUE_VERSION,
    };
}

mod builder;
mod publisher;
mod subscriber;

pub use builder::{QueueBuilder, QueueOptions};
pub use publisher::Publisher;
pub use subscriber::Subscriber;

use crate::Core::errors::QueueError;
use crate::Core::identity::QueueIdentifier;
use crate::Core::SharedMemory::MemoryView;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use Buffer::layout::{queue_header_size, QueueHeader, FRAME_HEADER_SIZE, QUEUE_MAGIC, QUEUE_VERSION};
use Buffer::RingView;

/// The mapped region plus the ring view over it, shared by both roles.
pub(crate) struct SharedQueue {
    pub(crate) ring: RingView,
    // Keeps the mapping alive for the ring's raw pointers.
    _view: MemoryView,
}

impl SharedQueue {
    /// Map the region file, initializing it when this handle creates it and
    /// validating it when attaching to an existing one.
    pub(crate) fn open(
        identifier: &QueueIdentifier,
        capacity: u64,
        create_or_override: bool,
    ) -> Result<SharedQueue, QueueError> {
        if capacity == 0 || capacity % 8 != 0 || capacity < FRAME_HEADER_SIZE {
            return Err(QueueError::InvalidConfig(format!(
                "capacity must be a positive multiple of 8 of at least {FRAME_HEADER_SIZE} bytes, got {capacity}"
            )));
        }

        let size = queue_header_size() + capacity as usize;
        let view = MemoryView::open(&identifier.region_path(), size, create_or_override)
            .map_err(QueueError::Memory)?;

        let header = view.as_ptr() as *mut QueueHeader;
        if view.created() {
            // Plain writes are fine before the magic publishes the header.
            unsafe {
                std::ptr::addr_of_mut!((*header).version).write(QUEUE_VERSION);
                std::ptr::addr_of_mut!((*header)._reserved).write(0);
                std::ptr::addr_of_mut!((*header).capacity).write(capacity);
                (*header).write_offset.store(0, Ordering::Relaxed);
                (*header).read_offset.store(0, Ordering::Relaxed);
                (*header).magic.store(QUEUE_MAGIC, Ordering::Release);
            }
            tracing::debug!(
                queue = identifier.name(),
                capacity,
                "initialized shared region"
            );
        } else {
            // The creator may still be mid-initialization; give it a moment.
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                if unsafe { (*header).magic.load(Ordering::Acquire) } == QUEUE_MAGIC {
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(QueueError::Corrupted("shared region was never initialized"));
                }
                std::thread::sleep(Duration::from_millis(1));
            }

            let (found_version, found_capacity) =
                unsafe { ((*header).version, (*header).capacity) };
            if found_version != QUEUE_VERSION {
                return Err(QueueError::InvalidConfig(format!(
                    "layout version mismatch: expected {QUEUE_VERSION}, found {found_version}"
                )));
            }
            if found_capacity != capacity {
                return Err(QueueError::InvalidConfig(format!(
                    "capacity mismatch: configured {capacity}, region has {found_capacity}"
                )));
            }
            tracing::debug!(
                queue = identifier.name(),
                capacity,
                "attached to shared region"
            );
        }

        let base = unsafe { view.as_ptr().add(queue_header_size()) };
        let ring = unsafe { RingView::new(header, base) };
        Ok(SharedQueue { ring, _view: view })
    }
}
