//! Entity persistence capability for msync.
//!
//! The dispatch core never owns entities. It asks a [`Repository`] to find,
//! build, save and delete them, and it reads and writes entity attributes
//! through a [`ModelSchema`]: an explicit table from attribute name to a typed
//! getter/setter pair, built once at startup.
//!
//! # Storage Backends
//!
//! - [`InMemoryRepository`] -- `RwLock`-guarded rows for tests, demos and the CLI
//!
//! # Design Rules
//!
//! 1. Attribute access goes through the schema table; no field is reachable by
//!    a name that was not declared at registration time.
//! 2. `save` runs the schema's validation rules; a failing rule is a
//!    [`StoreError::Validation`].
//! 3. Lookups return clones. Callers mutate their copy and `save` it back.

pub mod error;
pub mod memory;
pub mod record;
pub mod schema;
pub mod traits;

pub use error::{SchemaError, SchemaResult, StoreError, StoreResult};
pub use memory::InMemoryRepository;
pub use record::Record;
pub use schema::{Model, ModelSchema, ModelSchemaBuilder};
pub use traits::Repository;
