use crate::Core::errors::QueueError;
use crate::Queue::Buffer::layout::{QueueHeader, FRAME_HEADER_SIZE};
use crate::Queue::Buffer::Buffer::RingView;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logical offsets fold before reaching this bound so `offset + frame_len`
/// can never overflow a u64 mid-computation.
pub const OFFSET_FOLD_AT: u64 = 1 << 63;

/// Largest multiple of `capacity` that is `<= OFFSET_FOLD_AT`. Subtracting
/// it from an offset preserves `offset % capacity`.
pub const fn fold_span(capacity: u64) -> u64 {
    OFFSET_FOLD_AT - (OFFSET_FOLD_AT % capacity)
}

/// Advance a logical offset by `len`, folding at the representable-range
/// boundary instead of wrapping to small values.
pub const fn advance_offset(offset: u64, len: u64, capacity: u64) -> u64 {
    let next = offset + len;
    if next >= OFFSET_FOLD_AT {
        next - fold_span(capacity)
    } else {
        next
    }
}

/// Unconsumed byte distance between the offsets. Handles the transient
/// window where the write offset has folded but the read offset has not yet
/// caught up.
pub const fn offset_distance(write: u64, read: u64, capacity: u64) -> u64 {
    if write >= read {
        write - read
    } else {
        write + fold_span(capacity) - read
    }
}

/// Round a frame length up to the 8-byte grain the ring is addressed in.
pub const fn align8(len: u64) -> u64 {
    (len + 7) & !7
}

impl RingView {
    /// `header` must point at an initialized control block and `base` at a
    /// payload area of at least `header.capacity` bytes, both valid for the
    /// lifetime of the view.
    pub unsafe fn new(header: *const QueueHeader, base: *mut u8) -> RingView {
        let capacity = (*header).capacity;
        RingView {
            header,
            base,
            capacity,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    /// The commit-tag cell of the frame at logical offset `offset`. The cell
    /// never straddles the ring end because capacity and frame lengths are
    /// multiples of 8.
    fn commit_cell(&self, offset: u64) -> &AtomicU64 {
        let pos = (offset % self.capacity) as usize;
        debug_assert_eq!(pos % 8, 0);
        unsafe { &*(self.base.add(pos) as *const AtomicU64) }
    }

    /// Copy `src` into the ring at logical offset `offset`, splitting at the
    /// ring end if the run wraps.
    fn write_wrapped(&self, offset: u64, src: &[u8]) {
        let capacity = self.capacity as usize;
        let pos = (offset % self.capacity) as usize;
        let first = src.len().min(capacity - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.base.add(pos), first);
            if first < src.len() {
                std::ptr::copy_nonoverlapping(
                    src.as_ptr().add(first),
                    self.base,
                    src.len() - first,
                );
            }
        }
    }

    fn read_wrapped(&self, offset: u64, dst: &mut [u8]) {
        let capacity = self.capacity as usize;
        let pos = (offset % self.capacity) as usize;
        let first = dst.len().min(capacity - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.add(pos), dst.as_mut_ptr(), first);
            if first < dst.len() {
                std::ptr::copy_nonoverlapping(
                    self.base,
                    dst.as_mut_ptr().add(first),
                    dst.len() - first,
                );
            }
        }
    }

    /// Append one message. `Ok(false)` when the ring lacks room (or the
    /// message can never fit); no side effects in that case.
    pub fn try_append(&self, body: &[u8]) -> Result<bool, QueueError> {
        let frame_len = align8(FRAME_HEADER_SIZE + body.len() as u64);
        if frame_len > self.capacity {
            return Ok(false);
        }

        let header = self.header();
        let claimed = loop {
            let write = header.write_offset.load(Ordering::Acquire);
            let read = header.read_offset.load(Ordering::Acquire);
            let used = offset_distance(write, read, self.capacity);
            if used > self.capacity {
                // The two loads are not one atomic snapshot; a consume
                // landing between them makes a healthy pair look broken.
                // Only a pair that holds on re-read is real corruption.
                if header.write_offset.load(Ordering::Acquire) != write
                    || header.read_offset.load(Ordering::Acquire) != read
                {
                    std::hint::spin_loop();
                    continue;
                }
                return Err(QueueError::Corrupted("write offset ran ahead of capacity"));
            }
            if used + frame_len > self.capacity {
                return Ok(false);
            }

            let next = advance_offset(write, frame_len, self.capacity);
            match header.write_offset.compare_exchange_weak(
                write,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break write,
                Err(_) => std::hint::spin_loop(),
            }
        };

        // The claimed region is ours alone until the commit tag publishes it.
        // Clear the tag cell first: it may still hold a previous lap's body
        // bytes, which must never be readable as a commit.
        self.commit_cell(claimed).store(0, Ordering::Relaxed);
        let mut meta = [0u8; 8];
        meta[..4].copy_from_slice(&(body.len() as u32).to_le_bytes());
        self.write_wrapped(claimed + 8, &meta);
        if !body.is_empty() {
            self.write_wrapped(claimed + FRAME_HEADER_SIZE, body);
        }
        self.commit_cell(claimed)
            .store(claimed.wrapping_add(1), Ordering::Release);

        Ok(true)
    }

    /// Consume one message into `sink` (cleared and resized to the body).
    /// `Ok(false)` when the ring is empty or the head frame is not yet
    /// committed.
    pub fn try_consume(&self, sink: &mut Vec<u8>) -> Result<bool, QueueError> {
        let header = self.header();
        loop {
            let read = header.read_offset.load(Ordering::Acquire);
            let write = header.write_offset.load(Ordering::Acquire);
            let available = offset_distance(write, read, self.capacity);
            if available == 0 {
                return Ok(false);
            }
            if available > self.capacity {
                // Same non-atomic-snapshot hazard as in try_append.
                if header.read_offset.load(Ordering::Acquire) != read
                    || header.write_offset.load(Ordering::Acquire) != write
                {
                    std::hint::spin_loop();
                    continue;
                }
                return Err(QueueError::Corrupted("write offset ran ahead of capacity"));
            }

            // A producer claimed this frame but has not finished writing it.
            if self.commit_cell(read).load(Ordering::Acquire) != read.wrapping_add(1) {
                return Ok(false);
            }

            let mut meta = [0u8; 8];
            self.read_wrapped(read + 8, &mut meta);
            let body_len = u32::from_le_bytes([meta[0], meta[1], meta[2], meta[3]]) as u64;
            let frame_len = align8(FRAME_HEADER_SIZE + body_len);
            if frame_len > self.capacity || frame_len > available {
                // The frame may have been claimed by another consumer and
                // its bytes reused by a producer after the tag check. Retry
                // unless the whole picture is unchanged.
                if header.read_offset.load(Ordering::Acquire) != read
                    || header.write_offset.load(Ordering::Acquire) != write
                    || self.commit_cell(read).load(Ordering::Acquire) != read.wrapping_add(1)
                {
                    std::hint::spin_loop();
                    continue;
                }
                return Err(QueueError::Corrupted("frame length exceeds ring bounds"));
            }

            // Copy before claiming: once the CAS lands a producer may reuse
            // these bytes.
            sink.clear();
            sink.resize(body_len as usize, 0);
            if body_len > 0 {
                self.read_wrapped(read + FRAME_HEADER_SIZE, sink);
            }

            let next = advance_offset(read, frame_len, self.capacity);
            match header.read_offset.compare_exchange(
                read,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(true),
                // Another consumer took the frame; discard the copy and try
                // the next one.
                Err(_) => std::hint::spin_loop(),
            }
        }
    }
}
