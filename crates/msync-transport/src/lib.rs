//! Transport boundary for msync.
//!
//! The dispatch core never touches a broker. This crate defines the seam it
//! is driven through: a [`WireMessage`] (encoded body plus [`MessageHeaders`]),
//! the [`JsonCodec`] that converts envelopes to and from it, and the async
//! [`Transport`] / [`Subscription`] traits. [`InMemoryTransport`] is a
//! broadcast-channel implementation used for tests, demos and the CLI.
//!
//! [`MessageHeaders`]: msync_types::MessageHeaders

pub mod codec;
pub mod error;
pub mod memory;
pub mod message;
pub mod traits;

pub use codec::JsonCodec;
pub use error::{TransportError, TransportResult};
pub use memory::InMemoryTransport;
pub use message::WireMessage;
pub use traits::{Subscription, Transport};
