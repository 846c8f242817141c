//! In-process event bus (spec §4.2): one logical channel per thread plus one
//! global channel. A slow subscriber is buffered up to a bounded queue and
//! disconnected with `Lagged` on overflow; the bus has no persistence.
//!
//! Registration uses a `DashMap<ThreadId, Sender<BusEvent>>`, so
//! subscribe/unsubscribe never blocks a publisher.

use std::sync::Arc;

use dashmap::DashMap;
use gigi_protocol::ServerMessage;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Queue depth before a subscriber is considered lagging (spec §4.2: N = 256).
pub const QUEUE_DEPTH: usize = 256;

/// One published message: a stream segment plus the thread it belongs to.
/// Published on both the thread's own channel and the global channel, so a
/// dashboard subscriber can watch every thread at once.
#[derive(Clone, Debug)]
pub struct BusEvent {
    pub thread_id: String,
    pub message: ServerMessage,
}

/// A subscriber disconnected because it could not keep up; the spec directs
/// the caller to resync via a history snapshot by seq.
#[derive(Debug)]
pub struct Lagged {
    pub skipped: u64,
}

pub struct EventBus {
    threads: DashMap<String, broadcast::Sender<BusEvent>>,
    global: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(QUEUE_DEPTH);
        Self {
            threads: DashMap::new(),
            global,
        }
    }

    fn thread_sender(&self, thread_id: &str) -> broadcast::Sender<BusEvent> {
        self.threads
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(QUEUE_DEPTH).0)
            .clone()
    }

    /// Publishes a message to the thread's channel and the global channel.
    /// A channel with no subscribers silently drops the message (broadcast
    /// semantics); that's fine, nothing here is durable.
    pub fn publish(&self, thread_id: &str, message: ServerMessage) {
        let event = BusEvent {
            thread_id: thread_id.to_string(),
            message,
        };
        let _ = self.thread_sender(thread_id).send(event.clone());
        let _ = self.global.send(event);
    }

    /// Subscribes to one thread's live stream.
    pub fn subscribe(&self, thread_id: &str) -> BusSubscription {
        BusSubscription {
            inner: BroadcastStream::new(self.thread_sender(thread_id).subscribe()),
        }
    }

    /// Subscribes to every thread's live stream (used by a dashboard / the
    /// `conversation_list` view).
    pub fn subscribe_global(&self) -> BusSubscription {
        BusSubscription {
            inner: BroadcastStream::new(self.global.subscribe()),
        }
    }

    /// Drops the channel for a thread once it has no subscribers and will
    /// not be published to again (e.g. thread archived). Safe to call even
    /// if the thread was never registered.
    pub fn remove_thread(&self, thread_id: &str) {
        self.threads.remove(thread_id);
    }
}

pub type SharedEventBus = Arc<EventBus>;

/// One subscriber's stream: yields `Ok(BusEvent)` in publish order, or
/// `Err(Lagged)` once, at which point the caller must resync by seq and
/// decide whether to resubscribe.
pub struct BusSubscription {
    inner: BroadcastStream<BusEvent>,
}

impl BusSubscription {
    pub async fn recv(&mut self) -> Option<Result<BusEvent, Lagged>> {
        match self.inner.next().await {
            None => None,
            Some(Ok(event)) => Some(Ok(event)),
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "subscriber lagged, disconnecting");
                Some(Err(Lagged { skipped }))
            }
        }
    }
}
