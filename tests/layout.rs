// Layout conformance tests for the shared-region control block and the
// per-frame header. Every process mapping the same region must agree on
// these offsets; the tests also print the observed values to aid debugging
// when a mismatch occurs on a given platform.

use crossbeam_utils::CachePadded;
use dmxp_queue::Queue::Buffer::{queue_header_size, FrameHeader, QueueHeader, FRAME_HEADER_SIZE};
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU64;

#[test]
fn queue_header_layout() {
    let pad_align = align_of::<CachePadded<AtomicU64>>();
    let pad_size = size_of::<CachePadded<AtomicU64>>();

    // magic:8 + version:4 + _reserved:4 + capacity:8 = 24 bytes of scalar
    // prefix, then the two padded counters each on their own cache line.
    let expected_write = (24 + pad_align - 1) / pad_align * pad_align;
    let expected_read = expected_write + pad_size;
    let expected_size = expected_read + pad_size;

    let size = size_of::<QueueHeader>();
    let align = align_of::<QueueHeader>();
    let off_magic = offset_of!(QueueHeader, magic);
    let off_version = offset_of!(QueueHeader, version);
    let off_reserved = offset_of!(QueueHeader, _reserved);
    let off_capacity = offset_of!(QueueHeader, capacity);
    let off_write = offset_of!(QueueHeader, write_offset);
    let off_read = offset_of!(QueueHeader, read_offset);

    println!(
        "QueueHeader => size: {size}, expected: {expected_size}, align: {align}, offsets: [magic:{off_magic}, version:{off_version}, _reserved:{off_reserved}, capacity:{off_capacity}, write_offset:{off_write}, read_offset:{off_read}]"
    );

    assert_eq!(off_magic, 0);
    assert_eq!(off_version, 8);
    assert_eq!(off_reserved, 12);
    assert_eq!(off_capacity, 16);
    assert_eq!(off_write, expected_write);
    assert_eq!(off_read, expected_read);
    assert_eq!(size, expected_size);
    assert_eq!(align, pad_align);
    assert_eq!(queue_header_size(), size);
}

#[test]
fn frame_header_layout() {
    let size = size_of::<FrameHeader>();
    let align = align_of::<FrameHeader>();
    let off_tag = offset_of!(FrameHeader, commit_tag);
    let off_len = offset_of!(FrameHeader, body_len);
    let off_reserved = offset_of!(FrameHeader, _reserved);

    println!(
        "FrameHeader => size: {size}, align: {align}, offsets: [commit_tag:{off_tag}, body_len:{off_len}, _reserved:{off_reserved}]"
    );

    assert_eq!(size as u64, FRAME_HEADER_SIZE);
    assert_eq!(align, align_of::<u64>());
    assert_eq!(off_tag, 0);
    assert_eq!(off_len, 8);
    assert_eq!(off_reserved, 12);
}
