use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::TransportResult;
use crate::message::WireMessage;
use crate::traits::{Subscription, Transport};

/// Default per-topic channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process transport: one broadcast channel per topic.
///
/// Every subscriber sees every message published after it subscribed.
/// Publishing to a topic nobody listens on drops the message.
pub struct InMemoryTransport {
    topics: RwLock<HashMap<String, broadcast::Sender<WireMessage>>>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a transport whose topic channels buffer `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .expect("transport lock poisoned")
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop the topic. Subscribers drain what is buffered and then close.
    pub fn close(&self, topic: &str) -> bool {
        self.topics
            .write()
            .expect("transport lock poisoned")
            .remove(topic)
            .is_some()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, message: WireMessage) -> TransportResult<()> {
        let topics = self.topics.read().expect("transport lock poisoned");
        match topics.get(topic).map(|tx| tx.send(message)) {
            Some(Ok(receivers)) => {
                debug!(topic, receivers, "message published");
            }
            Some(Err(_)) | None => {
                debug!(topic, "no subscribers, message dropped");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Box<dyn Subscription>> {
        let mut topics = self.topics.write().expect("transport lock poisoned");
        let receiver = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!(topic, "subscribed");
        Ok(Box::new(BroadcastSubscription {
            topic: topic.to_string(),
            receiver,
        }))
    }
}

struct BroadcastSubscription {
    topic: String,
    receiver: broadcast::Receiver<WireMessage>,
}

#[async_trait]
impl Subscription for BroadcastSubscription {
    async fn recv(&mut self) -> TransportResult<Option<WireMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged, messages dropped");
                }
            }
        }
    }
}
