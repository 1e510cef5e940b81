/// Errors from attribute access through a [`ModelSchema`](crate::ModelSchema).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The attribute was never declared for this class.
    #[error("unknown field '{field}' on {class}")]
    UnknownField { class: String, field: String },

    /// The attribute is computed and has no setter.
    #[error("field '{field}' on {class} is read-only")]
    ReadOnlyField { class: String, field: String },

    /// The JSON value could not be converted to or from the field type.
    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The class name is blank.
    #[error("model class name must not be empty")]
    EmptyClass,
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors from repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// One or more validation rules rejected the entity on save.
    #[error("validation failed for {class}: {}", errors.join("; "))]
    Validation { class: String, errors: Vec<String> },

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;
