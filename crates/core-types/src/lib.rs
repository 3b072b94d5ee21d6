//! Shared primitives for the webmend resilience engine.
//!
//! Identifier newtypes used across the workspace, plus the [`ActionContext`]
//! gating enum that decides how much autonomy the retry machinery is allowed
//! for a given interaction.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the project (tenant) a test run belongs to.
///
/// Healing memory is scoped by this ID; nothing learned in one project is
/// ever visible to another.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one test run. Each run owns its own orchestrator instance and
/// in-run healing cache.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single action submission for tracing and correlation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gating policy for a submitted action.
///
/// The context decides how much autonomy the engine has: a restricted
/// context disables retries, healing, and alternative proposals in one
/// stroke. The orchestrator must return after exactly one attempt in any
/// restricted context, regardless of the configured retry limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionContext {
    /// Full retry, healing, and alternative-strategy machinery available.
    Normal,

    /// Sensitive interaction (payment confirmation, destructive submit):
    /// one attempt, no recovery, report the raw outcome.
    SafetyCritical,
}

impl ActionContext {
    /// Whether more than one attempt may be made.
    pub fn allows_retry(&self) -> bool {
        !self.is_restricted()
    }

    /// Whether the selector healing ladder may run.
    pub fn allows_healing(&self) -> bool {
        !self.is_restricted()
    }

    /// Whether an alternative interaction may be proposed and adopted.
    pub fn allows_alternatives(&self) -> bool {
        !self.is_restricted()
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, ActionContext::SafetyCritical)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionContext::Normal => "normal",
            ActionContext::SafetyCritical => "safety_critical",
        }
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        ActionContext::Normal
    }
}

impl fmt::Display for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_safety_critical_disables_everything() {
        let ctx = ActionContext::SafetyCritical;
        assert!(ctx.is_restricted());
        assert!(!ctx.allows_retry());
        assert!(!ctx.allows_healing());
        assert!(!ctx.allows_alternatives());
    }

    #[test]
    fn test_normal_context_allows_recovery() {
        let ctx = ActionContext::Normal;
        assert!(!ctx.is_restricted());
        assert!(ctx.allows_retry());
        assert!(ctx.allows_healing());
        assert!(ctx.allows_alternatives());
    }

    #[test]
    fn test_context_serde_spelling() {
        let json = serde_json::to_string(&ActionContext::SafetyCritical).unwrap();
        assert_eq!(json, "\"safety_critical\"");
    }
}
