use thiserror::Error;

use crate::types::BackendKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller misuse. The only class the engine hands back to callers.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding failed ({model}): {message}")]
    Embedding { model: String, message: String },

    #[error("{backend} backend failed: {message}")]
    Backend { backend: BackendKind, message: String },
}

impl Error {
    /// Wrap any backend-side failure, keeping the full context chain.
    pub fn backend(backend: BackendKind, err: impl std::fmt::Display) -> Self {
        Self::Backend { backend, message: format!("{err:#}") }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self { Self::InvalidArgument(msg.into()) }

    pub fn is_invalid_argument(&self) -> bool { matches!(self, Self::InvalidArgument(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;
