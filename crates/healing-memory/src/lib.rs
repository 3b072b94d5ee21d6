//! Cross-run selector recovery memory, scoped per project
//!
//! Successful heals are remembered under `(project, page signature,
//! original selector)` and preferred over recomputation on later runs.
//! Entries are project-private; there is no global or cross-tenant
//! learning.

pub mod errors;
pub mod model;
pub mod signature;
pub mod store;

pub use errors::*;
pub use model::*;
pub use signature::*;
pub use store::*;
