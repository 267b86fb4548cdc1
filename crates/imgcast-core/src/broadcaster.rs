//! Per-room fan-out of server-sent event frames.
//!
//! Each [`Broadcaster`] owns a subscriber set and one delivery task. Producers
//! call [`Broadcaster::notify`], which pushes a unit signal onto a small
//! bounded queue and returns immediately. The delivery task drains the queue
//! and runs one fan-out pass per signal.
//!
//! # Delivery semantics
//!
//! - A subscriber always sees `connected` before any `updated` frame.
//! - A full queue drops the signal (logged). Signals carry no count, so `N`
//!   rapid notifications yield between 1 and `N` passes.
//! - A sink whose write fails is dropped from the set; the pass continues.
//! - The subscriber lock is held for a whole pass, so one slow sink stalls
//!   the sinks after it in that pass.

use std::{
    collections::HashMap,
    fmt, io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    runtime::Handle,
    sync::{Mutex, mpsc},
};

/// Default capacity of the notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Frame written to a subscriber when it is registered.
pub const CONNECTED_FRAME: &[u8] = b"data: connected\n\n";

/// Frame written to every subscriber on each fan-out pass.
pub const UPDATED_FRAME: &[u8] = b"data: updated\n\n";

/// Output stream of one subscriber.
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

type SubscriberSet = Arc<Mutex<HashMap<SubscriberId, Sink>>>;

/// Opaque handle returned by [`Broadcaster::add_subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscriber set plus notification queue for a single room.
pub struct Broadcaster {
    room: String,
    subscribers: SubscriberSet,
    signals: mpsc::Sender<()>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster with the default queue capacity.
    ///
    /// Spawns the delivery task on the current Tokio runtime, so this must be
    /// called from within one. The task exits once the broadcaster is dropped.
    pub fn new(room: impl Into<String>) -> Self {
        Self::with_capacity(room, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broadcaster whose notification queue holds `capacity`
    /// pending signals (at least one), on the current runtime.
    pub fn with_capacity(room: impl Into<String>, capacity: usize) -> Self {
        Self::spawn_on(&Handle::current(), room, capacity)
    }

    /// Create a broadcaster whose delivery task runs on `runtime`.
    ///
    /// Callable from any thread, inside a runtime or not.
    pub fn spawn_on(runtime: &Handle, room: impl Into<String>, capacity: usize) -> Self {
        let room = room.into();
        let (signals, rx) = mpsc::channel(capacity.max(1));
        let subscribers: SubscriberSet = Arc::new(Mutex::new(HashMap::new()));

        runtime.spawn(deliver(room.clone(), rx, Arc::clone(&subscribers)));

        Self { room, subscribers, signals, next_id: AtomicU64::new(0) }
    }

    /// Register `sink` and write the `connected` frame to it.
    ///
    /// The frame is written and flushed before the handle is returned. If
    /// that write fails the sink is not registered and the error is returned.
    pub async fn add_subscriber<W>(&self, sink: W) -> io::Result<SubscriberId>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut sink: Sink = Box::new(sink);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Held across the write so no fan-out pass can get ahead of `connected`
        let mut subscribers = self.subscribers.lock().await;
        write_frame(&mut sink, CONNECTED_FRAME).await?;
        subscribers.insert(id, sink);

        tracing::debug!(room = %self.room, subscriber = %id, count = subscribers.len(), "subscriber added");
        Ok(id)
    }

    /// Deregister a subscriber. Unknown or already removed handles are
    /// ignored.
    pub async fn remove_subscriber(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.remove(&id).is_some() {
            tracing::debug!(room = %self.room, subscriber = %id, count = subscribers.len(), "subscriber removed");
        }
    }

    /// Ask the delivery task to send `updated` to every subscriber.
    ///
    /// Never blocks. Returns `false` if the signal was dropped because the
    /// queue is full or the delivery task is gone.
    pub fn notify(&self) -> bool {
        match self.signals.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::warn!(room = %self.room, "notification queue full, skipping notification");
                false
            },
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!(room = %self.room, "delivery task stopped, notification dropped");
                false
            },
        }
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("room", &self.room)
            .field("queue_capacity", &self.signals.max_capacity())
            .finish_non_exhaustive()
    }
}

/// Delivery loop: one fan-out pass per drained signal.
async fn deliver(room: String, mut signals: mpsc::Receiver<()>, subscribers: SubscriberSet) {
    while signals.recv().await.is_some() {
        let mut subscribers = subscribers.lock().await;
        tracing::info!(room = %room, count = subscribers.len(), "broadcasting update to subscribers");

        let mut failed = Vec::new();
        for (id, sink) in &mut *subscribers {
            if let Err(e) = write_frame(sink, UPDATED_FRAME).await {
                tracing::debug!(room = %room, subscriber = %id, error = %e, "dropping subscriber after write failure");
                failed.push(*id);
            }
        }

        for id in failed {
            subscribers.remove(&id);
        }
    }

    tracing::debug!(room = %room, "delivery task finished");
}

async fn write_frame(sink: &mut Sink, frame: &[u8]) -> io::Result<()> {
    sink.write_all(frame).await?;
    sink.flush().await
}
