use std::future::Future;
use std::sync::Arc;

use msync_core::{Dispatcher, Registry};
use msync_transport::Transport;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::{SdkError, SdkResult};
use crate::listener::{Listener, ListenerStats};
use crate::publisher::Publisher;

/// Process-scoped sync context.
///
/// Can only be built from a frozen [`Registry`], so every binding is
/// registered before the first message is received.
pub struct SyncContext {
    config: SyncConfig,
    dispatcher: Arc<Dispatcher>,
    publisher: Publisher,
    transport: Arc<dyn Transport>,
}

impl SyncContext {
    pub fn new(config: SyncConfig, registry: Registry, transport: Arc<dyn Transport>) -> SdkResult<Self> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), config.dispatcher_config()));
        let publisher = Publisher::new(Arc::clone(&transport), config.topic.clone());
        info!(
            topic = %config.topic,
            bindings = dispatcher.registry().len(),
            publications = dispatcher.registry().publications().len(),
            "sync context ready"
        );
        Ok(Self {
            config,
            dispatcher,
            publisher,
            transport,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn listener(&self) -> Listener {
        Listener::new(Arc::clone(&self.dispatcher))
    }

    /// Subscribe to the configured topic and spawn the receive loop.
    ///
    /// The subscription exists by the time this returns, so anything
    /// published afterwards is received.
    pub async fn listen(&self) -> SdkResult<JoinHandle<SdkResult<ListenerStats>>> {
        self.listen_until(std::future::pending()).await
    }

    /// Like [`Self::listen`], stopping when `shutdown` completes.
    pub async fn listen_until<F>(&self, shutdown: F) -> SdkResult<JoinHandle<SdkResult<ListenerStats>>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let subscription = self.transport.subscribe(&self.config.topic).await?;
        let listener = self.listener();
        info!(topic = %self.config.topic, "listening");
        Ok(tokio::spawn(async move {
            listener.run_until(subscription, shutdown).await
        }))
    }
}

/// Wait for a spawned receive loop and flatten its result.
pub async fn join_listener(handle: JoinHandle<SdkResult<ListenerStats>>) -> SdkResult<ListenerStats> {
    handle
        .await
        .map_err(|e| SdkError::Listener(e.to_string()))?
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
