use std::future::Future;
use std::sync::Arc;

use msync_core::{DispatchReport, Dispatcher};
use msync_transport::{JsonCodec, Subscription, WireMessage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SdkResult;

/// Counters accumulated by a receive loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    /// Messages taken off the subscription.
    pub received: u64,
    /// Messages decoded and dispatched.
    pub dispatched: u64,
    /// Messages dropped before dispatch (unmanaged or undecodable).
    pub dropped: u64,
    /// Failed binding invocations across all dispatched messages.
    pub failures: u64,
}

impl ListenerStats {
    fn record(&mut self, report: Option<&DispatchReport>) {
        self.received += 1;
        match report {
            Some(report) => {
                self.dispatched += 1;
                self.failures += report.failure_count() as u64;
            }
            None => self.dropped += 1,
        }
    }
}

/// Receiving side: decodes wire messages and hands them to the dispatcher.
///
/// Handler failures never escape [`Listener::handle`], so one bad message
/// or handler cannot stall the receive loop.
#[derive(Clone, Debug)]
pub struct Listener {
    dispatcher: Arc<Dispatcher>,
}

impl Listener {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Process one message. Returns `None` when it was not dispatched.
    pub fn handle(&self, message: &WireMessage) -> Option<DispatchReport> {
        if !message.is_managed() {
            debug!(
                class = %message.headers.class,
                action = %message.headers.action,
                "ignoring message without model-sync flag"
            );
            return None;
        }
        match JsonCodec::decode(message) {
            Ok(envelope) => Some(self.dispatcher.process(&envelope)),
            Err(err) => {
                warn!(
                    class = %message.headers.class,
                    action = %message.headers.action,
                    error = %err,
                    "dropping undecodable message"
                );
                None
            }
        }
    }

    /// Receive and process until the subscription closes.
    pub async fn run(&self, subscription: Box<dyn Subscription>) -> SdkResult<ListenerStats> {
        self.run_until(subscription, std::future::pending()).await
    }

    /// Receive and process until the subscription closes or `shutdown`
    /// completes.
    pub async fn run_until<F>(
        &self,
        mut subscription: Box<dyn Subscription>,
        shutdown: F,
    ) -> SdkResult<ListenerStats>
    where
        F: Future<Output = ()>,
    {
        let mut stats = ListenerStats::default();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("listener shutting down");
                    break;
                }
                next = subscription.recv() => match next? {
                    Some(message) => {
                        let report = self.handle(&message);
                        stats.record(report.as_ref());
                    }
                    None => {
                        info!("subscription closed");
                        break;
                    }
                },
            }
        }
        debug!(?stats, "listener stopped");
        Ok(stats)
    }
}
