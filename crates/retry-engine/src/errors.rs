//! Error types for retry orchestration

use thiserror::Error;
use webmend_driver_bridge::DriverError;

/// Terminal failure reported in a [`crate::RetryResult`]
///
/// Only the `Driver` variant can mark a run as stuck; the other variants
/// describe submissions the orchestrator refused or abandoned before
/// recovery was exhausted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetryError {
    /// Last driver failure, permanent or still failing when attempts ran out
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The action context forbids automated recovery
    #[error("action context forbids automated retries")]
    ContextForbidden,

    /// A testability assessment blocked this selector before the run
    #[error("selector blocked by testability assessment: {0}")]
    SelectorBlocked(String),

    /// The run was cancelled between attempts
    #[error("retry run cancelled")]
    Cancelled,
}

impl RetryError {
    /// Whether this failure came from the driver rather than a gate.
    pub fn is_driver(&self) -> bool {
        matches!(self, RetryError::Driver(_))
    }
}
