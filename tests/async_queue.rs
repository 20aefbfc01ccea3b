// Async dequeue paths on a multi-thread tokio runtime.

#![cfg(unix)]

use dmxp_queue::{CancellationToken, QueueBuilder};
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pair(
    root: &tempfile::TempDir,
    name: &str,
) -> (dmxp_queue::Publisher, Arc<dmxp_queue::Subscriber>) {
    let publisher = QueueBuilder::new(name)
        .with_root(root.path())
        .with_capacity(1024)
        .with_create_or_override(true)
        .create_publisher()
        .unwrap();
    let subscriber = Arc::new(
        QueueBuilder::new(name)
            .with_root(root.path())
            .with_capacity(1024)
            .create_subscriber()
            .unwrap(),
    );
    (publisher, subscriber)
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn async_dequeue_receives_delayed_publish() {
    let root = tempfile::tempdir().unwrap();
    let (publisher, subscriber) = pair(&root, "async-delayed");

    let delayed = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        assert!(publisher.try_enqueue(b"eventually"));
    });

    let mut message = Vec::new();
    let got = subscriber
        .dequeue_async(&mut message, &CancellationToken::new())
        .await
        .unwrap();
    assert!(got);
    assert_eq!(message, b"eventually");
    delayed.join().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn async_dequeue_returns_immediately_when_ready() {
    let root = tempfile::tempdir().unwrap();
    let (publisher, subscriber) = pair(&root, "async-ready");

    assert!(publisher.try_enqueue(b"already here"));

    let started = Instant::now();
    let mut message = Vec::new();
    let got = subscriber
        .dequeue_async(&mut message, &CancellationToken::new())
        .await
        .unwrap();

    assert!(got);
    assert_eq!(message, b"already here");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn async_dequeue_cancels_promptly() {
    let root = tempfile::tempdir().unwrap();
    let (_publisher, subscriber) = pair(&root, "async-cancel");

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };

    let started = Instant::now();
    let mut message = Vec::new();
    let got = subscriber.dequeue_async(&mut message, &token).await.unwrap();
    let elapsed = started.elapsed();

    assert!(!got);
    assert!(elapsed < Duration::from_secs(1), "cancel was not prompt: {elapsed:?}");
    canceller.join().unwrap();
}
