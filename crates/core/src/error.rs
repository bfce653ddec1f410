//! Error types for EdgeInfer core

use thiserror::Error;

/// Result type alias for EdgeInfer core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in EdgeInfer core
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single field's payload could not be decoded into a tensor
    /// (invalid JSON, or an element does not fit the target width)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Downstream emission failed
    #[error("Emitter error: {0}")]
    Emit(String),
}

impl Error {
    /// Shorthand for [`Error::Config`]
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Shorthand for [`Error::Decode`]
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode(message.into())
    }
}
