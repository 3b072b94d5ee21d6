//! Error types for the healing ladder

use thiserror::Error;
use webmend_driver_bridge::DriverError;

/// Errors emitted by healing strategies
///
/// The healer absorbs strategy failures and keeps climbing the ladder;
/// these surface in logs and in the `Skipped`/`Exhausted` outcomes.
#[derive(Debug, Error)]
pub enum HealError {
    /// Driver failure while generating or verifying candidates
    #[error("driver failure during healing: {0}")]
    Driver(#[from] DriverError),

    /// Reasoning service failure during the vision strategy
    #[error("reasoning failure during healing: {0}")]
    Reasoning(String),
}
