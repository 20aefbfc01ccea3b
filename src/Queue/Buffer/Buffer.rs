use crate::Queue::Buffer::layout::QueueHeader;

/// Raw view over one queue's shared region: the control block plus the ring
/// payload area that follows it.
///
/// ### Concurrency design
///
/// Multiple producers and multiple consumers, across threads and processes,
/// operate on the same view concurrently with no locks:
///
/// - A producer claims `[w, w + frame_len)` with a CAS on `write_offset`,
///   writes the frame body into the claimed region, then publishes it with a
///   release-store of the frame's `commit_tag`. Between claim and publish the
///   region is invisible to consumers.
/// - A consumer observes a committed frame at `read_offset`, copies the body
///   out, then claims the frame with a CAS on `read_offset`. The copy happens
///   before the claim because a producer may reuse the bytes immediately
///   after the claim lands.
/// - Both offsets only ever move forward (modulo the overflow fold), so a
///   lost CAS means another party made progress; the loser reloads and
///   retries.
/// - The offset pair is never loaded as one atomic snapshot, so a party
///   preempted between the two loads can observe an implausible pair while
///   the ring is healthy. Such states are re-read and only reported as
///   corruption when they hold stable.
///
/// The view does not own the mapping; the handle embedding it keeps the
/// `MemoryView` alive for as long as the view exists.
pub struct RingView {
    pub(crate) header: *const QueueHeader,
    pub(crate) base: *mut u8,
    pub(crate) capacity: u64,
}

// All shared-state access goes through atomics or claimed regions; the raw
// pointers target a mapping that outlives the view.
unsafe impl Send for RingView {}
unsafe impl Sync for RingView {}
