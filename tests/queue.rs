// End-to-end tests through the public handles, each against its own
// temporary root directory.

#![cfg(unix)]

use dmxp_queue::{CancellationToken, QueueBuilder, QueueError, SignalBackend};
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn builder(name: &str, root: &tempfile::TempDir) -> QueueBuilder {
    QueueBuilder::new(name).with_root(root.path())
}

#[test]
fn round_trip_sample_message() {
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("sample", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("sample", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap();

    assert!(publisher.try_enqueue(b"hello across processes"));

    let mut message = Vec::new();
    assert!(subscriber.try_dequeue(&mut message).unwrap());
    assert_eq!(message, b"hello across processes");
    assert!(!subscriber.try_dequeue(&mut message).unwrap());
}

#[test]
fn fifo_order() {
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("fifo", &root)
        .with_capacity(4096)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("fifo", &root)
        .with_capacity(4096)
        .create_subscriber()
        .unwrap();

    for i in 0u32..50 {
        assert!(publisher.try_enqueue(&i.to_le_bytes()));
    }
    let mut message = Vec::new();
    for i in 0u32..50 {
        assert!(subscriber.try_dequeue(&mut message).unwrap());
        assert_eq!(message, i.to_le_bytes());
    }
}

#[test]
fn single_frame_capacity_backpressure() {
    // Capacity 24 holds exactly one frame with a body up to 8 bytes.
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("tiny", &root)
        .with_capacity(24)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("tiny", &root)
        .with_capacity(24)
        .create_subscriber()
        .unwrap();

    assert!(publisher.try_enqueue(b"abc"));
    assert!(!publisher.try_enqueue(b"d"));

    let mut message = Vec::new();
    assert!(subscriber.try_dequeue(&mut message).unwrap());
    assert_eq!(message, b"abc");

    assert!(publisher.try_enqueue(b"d"));
    // A body that can never fit is rejected even on an empty ring.
    assert!(!publisher.try_enqueue(&[0u8; 16]));
}

#[test]
fn create_or_override_discards_previous_session() {
    let root = tempfile::tempdir().unwrap();
    {
        let publisher = builder("fresh", &root)
            .with_capacity(1024)
            .with_create_or_override(true)
            .create_publisher()
            .unwrap();
        assert!(publisher.try_enqueue(b"stale"));
    }

    let _publisher = builder("fresh", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("fresh", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap();

    let mut message = Vec::new();
    assert!(!subscriber.try_dequeue(&mut message).unwrap());
}

#[test]
fn messages_survive_publisher_drop() {
    let root = tempfile::tempdir().unwrap();
    {
        let publisher = builder("persist", &root)
            .with_capacity(1024)
            .with_create_or_override(true)
            .create_publisher()
            .unwrap();
        assert!(publisher.try_enqueue(b"outlives the writer"));
    }

    let subscriber = builder("persist", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap();
    let mut message = Vec::new();
    assert!(subscriber.try_dequeue(&mut message).unwrap());
    assert_eq!(message, b"outlives the writer");
}

#[test]
#[serial]
fn blocked_dequeue_returns_on_close() {
    let root = tempfile::tempdir().unwrap();
    let subscriber = Arc::new(
        builder("close", &root)
            .with_capacity(1024)
            .with_create_or_override(true)
            .create_subscriber()
            .unwrap(),
    );

    let worker = {
        let subscriber = Arc::clone(&subscriber);
        std::thread::spawn(move || {
            let mut message = Vec::new();
            let started = Instant::now();
            let result = subscriber.dequeue(&mut message, &CancellationToken::new());
            (result, started.elapsed())
        })
    };

    std::thread::sleep(Duration::from_millis(200));
    subscriber.close();

    let (result, elapsed) = worker.join().unwrap();
    assert!(!result.unwrap());
    assert!(elapsed < Duration::from_secs(3), "dequeue hung: {elapsed:?}");
}

#[test]
#[serial]
fn publisher_disposal_does_not_hang_blocked_subscriber() {
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("dispose", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("dispose", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap();

    let disposer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        drop(publisher);
    });

    let started = Instant::now();
    let mut message = Vec::new();
    let got = subscriber
        .dequeue_timeout(&mut message, Duration::from_millis(500))
        .unwrap();
    let elapsed = started.elapsed();

    assert!(!got);
    assert!(elapsed < Duration::from_secs(3), "dequeue hung: {elapsed:?}");
    disposer.join().unwrap();
}

#[test]
#[serial]
fn dequeue_timeout_is_bounded() {
    let root = tempfile::tempdir().unwrap();
    let subscriber = builder("timeout", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_subscriber()
        .unwrap();

    let started = Instant::now();
    let mut message = Vec::new();
    let got = subscriber
        .dequeue_timeout(&mut message, Duration::from_millis(300))
        .unwrap();
    let elapsed = started.elapsed();

    assert!(!got);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(3), "timeout overshot: {elapsed:?}");
}

fn dequeue_wakes_on_publish(backend: SignalBackend) {
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("wake", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .with_signal_backend(backend)
        .create_publisher()
        .unwrap();
    let subscriber = builder("wake", &root)
        .with_capacity(1024)
        .with_signal_backend(backend)
        .create_subscriber()
        .unwrap();

    let delayed = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        assert!(publisher.try_enqueue(b"wake up"));
    });

    let mut message = Vec::new();
    assert!(subscriber
        .dequeue(&mut message, &CancellationToken::new())
        .unwrap());
    assert_eq!(message, b"wake up");
    delayed.join().unwrap();
}

#[test]
#[serial]
fn dequeue_wakes_on_publish_sockets() {
    dequeue_wakes_on_publish(SignalBackend::Sockets);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn dequeue_wakes_on_publish_named_semaphore() {
    dequeue_wakes_on_publish(SignalBackend::NamedSemaphore);
}

#[test]
fn attaching_to_uninitialized_region_is_fatal() {
    use dmxp_queue::Queue::Buffer::queue_header_size;

    let root = tempfile::tempdir().unwrap();
    // A region file of the right size whose magic never appears, as left by
    // a creator that died before initializing the header.
    let path = root.path().join("dead.dq");
    std::fs::write(&path, vec![0u8; queue_header_size() + 1024]).unwrap();

    let err = builder("dead", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap_err();
    assert!(matches!(err, QueueError::Corrupted(_)), "{err}");
}

#[test]
fn invalid_configuration_is_rejected() {
    let root = tempfile::tempdir().unwrap();

    for capacity in [0u64, 8, 12, 30] {
        let err = builder("bad-capacity", &root)
            .with_capacity(capacity)
            .with_create_or_override(true)
            .create_publisher()
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidConfig(_)), "capacity {capacity}: {err}");
    }

    for name in ["", "a/b", "a\\b", "../escape"] {
        let err = QueueBuilder::new(name)
            .with_root(root.path())
            .create_publisher()
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidConfig(_)), "name {name:?}: {err}");
    }
}

#[test]
fn wraparound_20k_through_handles() {
    let root = tempfile::tempdir().unwrap();
    let publisher = builder("circle", &root)
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = builder("circle", &root)
        .with_capacity(1024)
        .create_subscriber()
        .unwrap();

    let mut message = Vec::new();
    for i in 0u32..20_000 {
        let body: Vec<u8> = (0..66u32).map(|j| (i.wrapping_add(j) & 0xFF) as u8).collect();
        assert!(publisher.try_enqueue(&body), "enqueue failed at {i}");
        assert!(subscriber.try_dequeue(&mut message).unwrap(), "dequeue failed at {i}");
        assert_eq!(message, body, "payload mismatch at {i}");
    }
}
