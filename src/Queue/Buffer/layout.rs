// Shared-region layout. Every process mapping the same region file sees
// these structs at fixed offsets, so the layout is repr(C), versioned, and
// guarded by the magic word. Changing any field ordering or size is a
// version bump.

use crossbeam_utils::CachePadded;
use std::sync::atomic::AtomicU64;

/// "DMXP_IPQ" in ASCII. Release-stored last during region initialization;
/// attachers acquire-load it to know the header before it is fully written.
pub const QUEUE_MAGIC: u64 = 0x444D_5850_5F49_5051;

/// Current layout version.
pub const QUEUE_VERSION: u32 = 1;

/// Bytes of frame header preceding every message body.
pub const FRAME_HEADER_SIZE: u64 = 16;

/// Control block at offset 0 of the shared region. The ring payload area
/// starts immediately after it.
#[repr(C)]
pub struct QueueHeader {
    /// [`QUEUE_MAGIC`] once the region is initialized; zero before that.
    pub magic: AtomicU64,

    /// Layout version; attachers reject a mismatch.
    pub version: u32,

    pub _reserved: u32,

    /// Ring payload size in bytes. Immutable after creation; attachers
    /// reject a region whose capacity differs from their configuration.
    pub capacity: u64,

    /// Logical head of unclaimed space. Monotonically increasing except for
    /// the overflow fold; advanced only by CAS. Padded to its own cache line
    /// so producers and consumers do not false-share.
    pub write_offset: CachePadded<AtomicU64>,

    /// Logical tail of unconsumed messages. Same discipline as
    /// `write_offset`. Invariant: `read <= write <= read + capacity` in the
    /// fold-aware sense.
    pub read_offset: CachePadded<AtomicU64>,
}

/// Header of one frame, at physical position `offset % capacity`.
///
/// `commit_tag` is the commit point: a producer release-stores
/// `logical_offset + 1` after the body is fully written, and a consumer only
/// accepts the frame when the tag matches its own read offset plus one. The
/// `+ 1` keeps the zero-filled initial region from ever looking committed.
/// Frame boundaries shift between laps, so the tag position of a new frame
/// can hold a previous frame's body bytes; producers zero the cell right
/// after claiming, before any body write, so leftover payload cannot
/// masquerade as a commit. Capacity and frame lengths are multiples of 8,
/// so this cell never straddles the ring end; `body_len` and the body are
/// copied wrap-aware.
#[repr(C)]
pub struct FrameHeader {
    pub commit_tag: AtomicU64,
    pub body_len: u32,
    pub _reserved: u32,
}

/// Size of the control block, and the offset at which ring payload begins.
pub const fn queue_header_size() -> usize {
    std::mem::size_of::<QueueHeader>()
}
