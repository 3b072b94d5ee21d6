//! Pre-execution testability assessment
//!
//! Scores named interaction flows against the live page before running
//! them: per-element checks feed a confidence average, blockers force a
//! flow non-testable, and a hallucination guard catches flows whose
//! confidence collapses without an outright blocker. Problem flows get a
//! two-tiered root-cause diagnosis and, optionally, a notification pushed
//! to an external sink.

pub mod assessor;
pub mod checks;
pub mod errors;
pub mod notify;
pub mod root_cause;
pub mod types;

pub use assessor::*;
pub use checks::*;
pub use errors::*;
pub use notify::*;
pub use root_cause::*;
pub use types::*;
