use msync_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("codec error: {0}")]
    Codec(String),

    /// The body decoded but does not form a valid envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] TypeError),

    #[error("topic '{0}' is closed")]
    Closed(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
