//! High-level SDK for msync.
//!
//! Wires the dispatch core to a transport. Applications declare their
//! bindings on a [`RegistryBuilder`](msync_core::RegistryBuilder), freeze it,
//! and hand it to a [`SyncContext`] together with a [`SyncConfig`] and a
//! transport; the context owns the [`Publisher`] and spawns the [`Listener`].

pub mod config;
pub mod context;
pub mod error;
pub mod listener;
pub mod publisher;

pub use config::{register_config_subscriptions, SubscriptionConfig, SyncConfig};
pub use context::{join_listener, SyncContext};
pub use error::{SdkError, SdkResult};
pub use listener::{Listener, ListenerStats};
pub use publisher::Publisher;

// Re-export key types
pub use msync_core::{
    DispatchReport, Dispatcher, DispatcherConfig, MissingIdentityPolicy, ModelTarget,
    Publication, PublishSettings, Registry, RegistryBuilder, SubscribeSettings,
};
pub use msync_store::{InMemoryRepository, ModelSchema, Record, Repository};
pub use msync_transport::{InMemoryTransport, JsonCodec, Transport, WireMessage};
pub use msync_types::{Action, Envelope, Payload};
