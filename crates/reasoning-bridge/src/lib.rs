//! Reasoning service boundary - action proposals and visual localization
//!
//! Defines the optional AI seam of the engine: a [`ReasoningService`] trait
//! providers implement, bounded prompt builders, response parsing with
//! strict rejection of unstructured output, and a scriptable mock.

pub mod errors;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod service;

pub use errors::*;
pub use model::*;
pub use parse::*;
pub use prompt::*;
pub use service::*;
