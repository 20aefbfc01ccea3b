pub mod SharedMemory;
pub mod cancellation;
pub mod errors;
pub mod identity;
pub mod semaphore;
pub mod watcher;

pub use cancellation::CancellationToken;
pub use errors::{QueueError, QueueResult};
pub use identity::QueueIdentifier;
pub use SharedMemory::MemoryView;
