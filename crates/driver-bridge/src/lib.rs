//! Browser driver boundary - action execution and page geometry queries
//!
//! This crate defines the engine-facing surface of the browser automation
//! driver:
//! - Action and element snapshot types shared across the workspace
//! - The async [`BrowserDriver`] trait the engine is injected with
//! - A structured failure taxonomy with retryability classification
//! - A deterministic [`ScriptedDriver`] for tests and offline development

pub mod driver;
pub mod errors;
pub mod scripted;
pub mod types;

pub use driver::*;
pub use errors::*;
pub use scripted::*;
pub use types::*;
