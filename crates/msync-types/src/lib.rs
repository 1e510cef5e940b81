//! Foundation types for msync.
//!
//! Every change event that crosses a service boundary is carried as an
//! [`Envelope`]: the entity class, the [`Action`] that happened to it, an
//! optional identity value, and a JSON payload. Every other msync crate
//! depends on `msync-types`.
//!
//! # Key Types
//!
//! - [`Envelope`]: Canonical, self-describing change event
//! - [`Action`]: `create` / `update` / `destroy` or a custom action name
//! - [`MessageHeaders`]: Attribute set carried next to the encoded payload on the wire

pub mod action;
pub mod envelope;
pub mod error;
pub mod headers;

pub use action::Action;
pub use envelope::{Envelope, Payload};
pub use error::TypeError;
pub use headers::MessageHeaders;

/// Re-exported so downstream crates agree on one JSON value type.
pub use serde_json::Value;
