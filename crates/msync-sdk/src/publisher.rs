use std::sync::Arc;

use msync_core::{build_class_envelope, Publication};
use msync_store::Model;
use msync_transport::{JsonCodec, Transport};
use msync_types::{Action, Envelope, Payload};
use tracing::{debug, info};

use crate::error::SdkResult;

/// Sends outbound envelopes to the configured topic.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    topic: String,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and send an already built envelope.
    pub async fn publish(&self, envelope: &Envelope) -> SdkResult<()> {
        let message = JsonCodec::encode(envelope)?;
        info!(
            topic = %self.topic,
            class = %envelope.class,
            action = %envelope.action,
            id = ?envelope.identity(),
            payload = ?envelope.payload,
            "publishing message"
        );
        self.transport.publish(&self.topic, message).await?;
        Ok(())
    }

    /// Publish a class-level message carrying `data` as its payload.
    pub async fn publish_data(
        &self,
        class: &str,
        data: Payload,
        action: Action,
    ) -> SdkResult<Envelope> {
        let envelope = build_class_envelope(class, action, data)?;
        self.publish(&envelope).await?;
        Ok(envelope)
    }

    /// Publish a mutation of `model`. Returns `None` when the publication
    /// does not cover `action` or its skip hook vetoes the message.
    pub async fn publish_model<M: Model>(
        &self,
        publication: &Publication<M>,
        model: &M,
        action: Action,
    ) -> SdkResult<Option<Envelope>> {
        let label = action.to_string();
        match publication.envelope_for(model, action)? {
            Some(envelope) => {
                self.publish(&envelope).await?;
                Ok(Some(envelope))
            }
            None => {
                debug!(class = publication.class(), action = %label, "publish skipped");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").field("topic", &self.topic).finish()
    }
}
