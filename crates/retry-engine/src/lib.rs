//! Retry orchestration for flaky browser interactions
//!
//! Submissions run through a bounded attempt loop with three recovery
//! levers between attempts:
//!
//! 1. Selector healing after the first failure, retried without delay
//! 2. One alternative strategy proposal from the second failure on
//! 3. Exponential backoff between plain retries
//!
//! Two gates run before any attempt: a restricted action context refuses
//! automated recovery outright, and selectors blocked by a testability
//! assessment are never executed. A run that spends its attempt budget
//! reports `stuck`, the signal to hand the failure to a manual channel.

pub mod alternatives;
pub mod backoff;
pub mod errors;
pub mod orchestrator;
pub mod types;

pub use alternatives::*;
pub use backoff::*;
pub use errors::*;
pub use orchestrator::*;
pub use types::*;
