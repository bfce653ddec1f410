//! Error types for the Triton bridge

use thiserror::Error;

/// Result type alias for Triton bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the Triton bridge
#[derive(Debug, Error)]
pub enum Error {
    /// The remote handle could not be opened or maintained
    #[error("Connection error: {0}")]
    Connection(String),

    /// A remote inference call failed, errored remotely, or timed out
    ///
    /// Malformed or undecodable responses count as inference failures
    /// too; the call produced no usable result.
    #[error("Inference failed for model {model}: {message}")]
    Inference {
        /// Model the call targeted
        model: String,
        /// Failure detail
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Connection`]
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection(message.into())
    }

    /// Shorthand for [`Error::Inference`]
    pub fn inference(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Inference {
            model: model.into(),
            message: message.into(),
        }
    }
}
