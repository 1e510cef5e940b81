use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("envelope class must not be empty")]
    EmptyClass,

    #[error("envelope action must not be empty")]
    EmptyAction,

    #[error("payload must not be empty for action '{action}'")]
    EmptyPayload { action: String },
}
