//! Error types for assessment

use thiserror::Error;

/// Failure reported by a low-confidence notification sink
///
/// The assessor swallows and logs these; they never change an assessment.
#[derive(Debug, Error)]
#[error("notification sink failed: {0}")]
pub struct NotifyError(pub String);

impl NotifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
