//! Event dispatch and reconciliation core for msync.
//!
//! Inbound change events are matched against a frozen [`Registry`] of
//! [`HandlerBinding`]s and run through the [`Dispatcher`]. Each matched
//! binding either hands the payload to a registered class-level callable
//! (direct mode) or asks the [`Reconciler`] to upsert or delete a local
//! entity (reconciling mode). The publish side goes the other way: the
//! [`emitter`] turns a local mutation into an outbound [`Envelope`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use msync_core::{Dispatcher, DispatcherConfig, ModelTarget, Registry, SubscribeSettings};
//! use msync_store::{InMemoryRepository, ModelSchema, Record};
//! use msync_types::{Action, Envelope};
//!
//! let schema = Arc::new(ModelSchema::record("SampleUser", "id", &["title"]).unwrap());
//! let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
//!
//! let mut builder = Registry::builder();
//! builder.model(ModelTarget::new(schema, Arc::clone(&repo)));
//! builder
//!     .register_subscribe("SampleUser", SubscribeSettings::model(["title"]))
//!     .unwrap();
//! let dispatcher = Dispatcher::new(Arc::new(builder.build()), DispatcherConfig::default());
//!
//! let envelope = Envelope::new("SampleUser", Action::Create)
//!     .with_id(5)
//!     .with_value("title", "t");
//! let report = dispatcher.process(&envelope);
//! assert!(report.is_clean());
//! assert_eq!(repo.len(), 1);
//! ```
//!
//! [`Envelope`]: msync_types::Envelope

pub mod binding;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod matcher;
pub mod reconciler;
pub mod registry;
pub mod report;

pub use binding::{BindingMode, BoundHandler, ClassHandler, HandlerBinding};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use emitter::{
    build_class_envelope, build_model_envelope, Publication, PublicationInfo, PublishSettings,
};
pub use error::{EmitError, EmitResult, HandlerError, RegistryError, RegistryResult};
pub use matcher::match_bindings;
pub use reconciler::{EntityTarget, MissingIdentityPolicy, ModelTarget, Reconciler};
pub use registry::{Registry, RegistryBuilder, SubscribeSettings};
pub use report::{Applied, BindingOutcome, DispatchReport};
