//! Selector healing engine
//!
//! When a selector stops resolving, this crate walks an escalation ladder
//! of recovery strategies and verifies every candidate against the live
//! page before accepting it:
//!
//! 1. Memory replay: a heal proven on the same page in an earlier run
//! 2. Text: locate by the action's human label
//! 3. Attribute: prefix-match on a churned id
//! 4. Structural: tag/class skeleton of the original selector
//! 5. Vision: screenshot localization ranked by spatial gravity (optional)
//!
//! The ladder stops at the first accepted candidate. Acceptances are
//! cached for the rest of the run and persisted to the healing memory
//! store, scoped per project and page signature.

pub mod errors;
pub mod healer;
pub mod strategies;
pub mod types;
pub mod vision;

pub use errors::*;
pub use healer::*;
pub use strategies::*;
pub use types::*;
pub use vision::*;
