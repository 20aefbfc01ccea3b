use crate::Core::errors::QueueError;
use crate::Core::identity::QueueIdentifier;
use crate::Core::semaphore::{self, SignalBackend};
use crate::Queue::publisher::Publisher;
use crate::Queue::subscriber::Subscriber;
use crate::Queue::SharedQueue;
use std::path::PathBuf;

/// Resolved configuration for one queue handle.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub queue_name: String,
    pub root_path: PathBuf,
    pub capacity: u64,
    pub create_or_override: bool,
    pub signal_backend: SignalBackend,
}

/// Builder for queue handles.
///
/// Two processes connect to the same queue by using the same name and root
/// path. Defaults: the system temp directory, 1 MiB capacity, attach to an
/// existing region, automatic wake-backend selection.
///
/// ```no_run
/// # use dmxp_queue::QueueBuilder;
/// # fn main() -> Result<(), dmxp_queue::QueueError> {
/// let publisher = QueueBuilder::new("events")
///     .with_root("/var/run/my-app")
///     .with_capacity(64 * 1024)
///     .with_create_or_override(true)
///     .create_publisher()?;
/// # Ok(())
/// # }
/// ```
pub struct QueueBuilder {
    options: QueueOptions,
}

impl QueueBuilder {
    pub fn new(queue_name: impl Into<String>) -> QueueBuilder {
        QueueBuilder {
            options: QueueOptions {
                queue_name: queue_name.into(),
                root_path: std::env::temp_dir(),
                capacity: 1024 * 1024,
                create_or_override: false,
                signal_backend: SignalBackend::Auto,
            },
        }
    }

    /// Directory holding the region file and wake-primitive rendezvous.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> QueueBuilder {
        self.options.root_path = root.into();
        self
    }

    /// Ring payload size in bytes; must be a positive multiple of 8.
    pub fn with_capacity(mut self, capacity: u64) -> QueueBuilder {
        self.options.capacity = capacity;
        self
    }

    /// Discard any existing region at this identity and start fresh. Handles
    /// from a previous session keep their own mapping and are not observed.
    pub fn with_create_or_override(mut self, create_or_override: bool) -> QueueBuilder {
        self.options.create_or_override = create_or_override;
        self
    }

    pub fn with_signal_backend(mut self, backend: SignalBackend) -> QueueBuilder {
        self.options.signal_backend = backend;
        self
    }

    pub fn create_publisher(self) -> Result<Publisher, QueueError> {
        let options = self.options;
        let identifier = resolve_identifier(&options)?;
        let queue = SharedQueue::open(&identifier, options.capacity, options.create_or_override)?;
        let releaser = semaphore::create_releaser(&identifier, options.signal_backend)
            .map_err(QueueError::Signal)?;
        tracing::debug!(queue = identifier.name(), "created publisher");
        Ok(Publisher::new(identifier.name().to_owned(), queue, releaser))
    }

    pub fn create_subscriber(self) -> Result<Subscriber, QueueError> {
        let options = self.options;
        let identifier = resolve_identifier(&options)?;
        let queue = SharedQueue::open(&identifier, options.capacity, options.create_or_override)?;
        let waiter = semaphore::create_waiter(&identifier, options.signal_backend)
            .map_err(QueueError::Signal)?;
        tracing::debug!(queue = identifier.name(), "created subscriber");
        Ok(Subscriber::new(identifier.name().to_owned(), queue, waiter))
    }
}

fn resolve_identifier(options: &QueueOptions) -> Result<QueueIdentifier, QueueError> {
    let name = &options.queue_name;
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(QueueError::InvalidConfig(format!(
            "queue name must be a non-empty path-free token, got {name:?}"
        )));
    }

    // Canonicalize so every spelling of the root derives the same semaphore
    // name; the directory must exist for that.
    std::fs::create_dir_all(&options.root_path).map_err(QueueError::Memory)?;
    let root = options
        .root_path
        .canonicalize()
        .map_err(QueueError::Memory)?;
    Ok(QueueIdentifier::new(name.clone(), root))
}
