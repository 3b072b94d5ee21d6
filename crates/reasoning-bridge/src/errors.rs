//! Error types for the reasoning boundary

use thiserror::Error;

/// Errors emitted by reasoning service implementations.
#[derive(Debug, Error, Clone)]
pub enum ReasoningError {
    /// No provider configured, or the provider lacks this capability
    #[error("reasoning unavailable: {0}")]
    Unavailable(String),

    /// Provider response could not be parsed into a structured proposal
    #[error("malformed reasoning response: {0}")]
    Malformed(String),

    /// Provider-side failure (transport, quota, refusal)
    #[error("reasoning provider error: {0}")]
    Provider(String),
}

impl ReasoningError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}
