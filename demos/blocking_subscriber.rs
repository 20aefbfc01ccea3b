use dmxp_queue::{CancellationToken, QueueBuilder};
use std::env;

fn main() -> Result<(), dmxp_queue::QueueError> {
    let args: Vec<String> = env::args().collect();
    let queue_name = args.get(1).cloned().unwrap_or_else(|| "demo".to_owned());
    let root = env::temp_dir().join("dmxp-queue-demo");

    let subscriber = QueueBuilder::new(queue_name.as_str())
        .with_root(&root)
        .with_capacity(64 * 1024)
        .create_subscriber()?;

    println!("Blocking Subscriber: Waiting for messages on '{}'...", queue_name);

    let token = CancellationToken::new();
    let mut message = Vec::new();
    loop {
        match subscriber.dequeue(&mut message, &token)? {
            true => println!("Received: {}", String::from_utf8_lossy(&message)),
            false => {
                println!("Blocking Subscriber: Cancelled, shutting down");
                return Ok(());
            }
        }
    }
}
