use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("registry error: {0}")]
    Registry(#[from] msync_core::RegistryError),

    #[error("schema error: {0}")]
    Schema(#[from] msync_store::SchemaError),

    #[error("emit error: {0}")]
    Emit(#[from] msync_core::EmitError),

    #[error("transport error: {0}")]
    Transport(#[from] msync_transport::TransportError),

    #[error("listener task failed: {0}")]
    Listener(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
