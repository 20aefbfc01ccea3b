use dmxp_queue::QueueBuilder;
use std::env;

fn main() -> Result<(), dmxp_queue::QueueError> {
    let args: Vec<String> = env::args().collect();
    let queue_name = args.get(1).cloned().unwrap_or_else(|| "demo".to_owned());
    let root = env::temp_dir().join("dmxp-queue-demo");

    let subscriber = QueueBuilder::new(queue_name.as_str())
        .with_root(&root)
        .with_capacity(64 * 1024)
        .create_subscriber()?;

    println!("Subscriber: Polling queue '{}'...", queue_name);

    let mut message = Vec::new();
    let mut received = 0usize;
    loop {
        match subscriber.try_dequeue(&mut message)? {
            true => {
                received += 1;
                if received % 1000 == 0 {
                    println!(
                        "Received {} messages, last: {}",
                        received,
                        String::from_utf8_lossy(&message)
                    );
                }
            }
            false => std::thread::sleep(std::time::Duration::from_millis(1)),
        }
    }
}
