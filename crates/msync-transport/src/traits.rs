use async_trait::async_trait;

use crate::error::TransportResult;
use crate::message::WireMessage;

/// Pub/sub broker client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget send to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, message: WireMessage) -> TransportResult<()>;

    /// Start receiving messages published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> TransportResult<Box<dyn Subscription>>;
}

/// Receiving end of a topic subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Next message, or `None` once the subscription is closed.
    async fn recv(&mut self) -> TransportResult<Option<WireMessage>>;
}
