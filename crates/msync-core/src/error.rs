use msync_store::{SchemaError, StoreError};
use msync_types::TypeError;

/// Startup-time errors raised while populating the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{what} must not be empty")]
    EmptyName { what: &'static str },

    /// A direct-mode subscription names a callable that was never registered.
    #[error("no class handler registered for {class}.{action}")]
    UnknownHandler { class: String, action: String },

    /// A model subscription names a class with no registered entity target.
    #[error("no model registered for class {0}")]
    UnknownModel(String),

    #[error("model {0} is already registered")]
    DuplicateModel(String),

    /// An allow-listed attribute or identity key is not declared by the model.
    #[error("attribute '{attr}' is not declared on {class}")]
    UnknownAttribute { class: String, attr: String },

    #[error("invalid action: {0}")]
    InvalidAction(#[from] TypeError),
}

/// Result alias for registration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failure of a single handler invocation.
///
/// Always caught at the dispatcher's per-binding boundary; it never
/// propagates out of [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A direct-mode callable reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A create/update envelope arrived without an identity value and the
    /// dispatcher is configured to reject those.
    #[error("{class} {action} envelope carries no identity value")]
    MissingIdentity { class: String, action: String },

    #[error("binding {0} is not a reconciling binding")]
    NotReconciling(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The handler panicked; the payload of the panic is captured as text.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Convenience constructor for direct-mode callables.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Errors building an outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("invalid envelope: {0}")]
    Envelope(#[from] TypeError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result alias for envelope construction.
pub type EmitResult<T> = Result<T, EmitError>;
