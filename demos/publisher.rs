use dmxp_queue::QueueBuilder;
use std::env;

fn main() -> Result<(), dmxp_queue::QueueError> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [queue_name]", args[0]);
        std::process::exit(1);
    }

    let num_messages: usize = args[1].parse().expect("Invalid number of messages");
    let queue_name = args.get(2).cloned().unwrap_or_else(|| "demo".to_owned());
    let root = env::temp_dir().join("dmxp-queue-demo");

    let publisher = QueueBuilder::new(queue_name.as_str())
        .with_root(&root)
        .with_capacity(64 * 1024)
        .with_create_or_override(true)
        .create_publisher()?;

    println!(
        "Publisher: Created queue '{}' under {}",
        queue_name,
        root.display()
    );
    println!("Publisher: Sending {} messages...", num_messages);

    let start = std::time::Instant::now();
    let mut sent = 0usize;
    for i in 0..num_messages {
        let message = format!("message_{}", i);
        loop {
            if publisher.try_enqueue(message.as_bytes()) {
                sent += 1;
                if sent % 1000 == 0 {
                    println!("Sent {} messages", sent);
                }
                break;
            }
            // Ring full; wait for a subscriber to drain.
            std::thread::sleep(std::time::Duration::from_micros(10));
        }
    }

    let elapsed = start.elapsed();
    println!("Publisher: Sent {} messages in {:.2?}", sent, elapsed);
    println!(
        "Publisher: Throughput: {:.2} messages/sec",
        sent as f64 / elapsed.as_secs_f64()
    );

    Ok(())
}
