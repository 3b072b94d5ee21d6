//! Core types for the healing ladder

use chrono::Utc;
use serde::{Deserialize, Serialize};
use webmend_core_types::ProjectId;
use webmend_driver_bridge::{Action, BoundingBox};

/// Healing strategy enumeration
///
/// Defines the four recovery strategies in escalation order:
/// - Text: locate by the target's human label
/// - Attribute: stable-prefix match on a churned id
/// - Structural: tag/class skeleton of the original selector
/// - Vision: screenshot localization ranked by spatial gravity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealStrategy {
    /// Text and label matching
    Text,

    /// Id prefix matching
    Attribute,

    /// Tag/class skeleton matching
    Structural,

    /// Screenshot localization with gravity scoring
    Vision,
}

impl HealStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            HealStrategy::Text => "text",
            HealStrategy::Attribute => "attribute",
            HealStrategy::Structural => "structural",
            HealStrategy::Vision => "vision",
        }
    }

    /// Parse a strategy name back into the enum
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(HealStrategy::Text),
            "attribute" => Some(HealStrategy::Attribute),
            "structural" => Some(HealStrategy::Structural),
            "vision" => Some(HealStrategy::Vision),
            _ => None,
        }
    }

    /// All strategies in escalation order
    pub fn ladder() -> Vec<HealStrategy> {
        vec![
            HealStrategy::Text,
            HealStrategy::Attribute,
            HealStrategy::Structural,
            HealStrategy::Vision,
        ]
    }
}

/// A verified selector recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfHealingRecord {
    /// Strategy that produced the heal
    pub strategy: HealStrategy,

    /// Selector that stopped resolving
    pub original_selector: String,

    /// Replacement selector that verified against the live page
    pub healed_selector: String,

    /// Confidence in the replacement (0.0-1.0)
    pub confidence: f64,

    /// How the replacement was derived
    pub note: String,

    /// Whether this record was replayed from the memory store rather than
    /// freshly computed
    pub from_memory: bool,
}

/// Heal request for a failing action
#[derive(Debug, Clone)]
pub struct HealRequest {
    /// The failing action; its selector and target hint drive the ladder
    pub action: Action,

    /// Project whose memory may be consulted and updated
    pub project: ProjectId,

    /// Where the element was last seen, when known
    ///
    /// Without it the vision strategy has no gravity anchor and is skipped.
    pub last_known_box: Option<BoundingBox>,
}

impl HealRequest {
    pub fn new(action: Action, project: ProjectId) -> Self {
        Self {
            action,
            project,
            last_known_box: None,
        }
    }

    pub fn with_last_known_box(mut self, bounding_box: BoundingBox) -> Self {
        self.last_known_box = Some(bounding_box);
        self
    }

    /// Selector the ladder is trying to replace.
    pub fn original_selector(&self) -> Option<&str> {
        self.action.selector.as_deref()
    }
}

/// One replacement selector proposed by a strategy, pending verification
#[derive(Debug, Clone, PartialEq)]
pub struct HealCandidate {
    pub selector: String,
    pub confidence: f64,
    pub note: String,
}

impl HealCandidate {
    pub fn new(selector: impl Into<String>, confidence: f64, note: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            confidence,
            note: note.into(),
        }
    }
}

/// Heal outcome enumeration
#[derive(Debug, Clone)]
pub enum HealOutcome {
    /// A candidate verified against the live page
    Healed(SelfHealingRecord),

    /// Healing did not run (no selector, restricted context upstream)
    Skipped {
        /// Reason for skipping
        reason: String,
    },

    /// Every candidate failed verification
    Exhausted {
        /// Selectors that were tried, in order
        tried: Vec<String>,
    },
}

impl HealOutcome {
    /// Check if heal was successful
    pub fn is_success(&self) -> bool {
        matches!(self, HealOutcome::Healed(_))
    }

    /// Get the healing record if successful
    pub fn record(&self) -> Option<&SelfHealingRecord> {
        match self {
            HealOutcome::Healed(record) => Some(record),
            _ => None,
        }
    }
}

/// One entry in the healer's recent-event buffer
#[derive(Debug, Clone, Serialize)]
pub struct HealEvent {
    pub timestamp: i64,
    pub original_selector: String,
    pub healed_selector: Option<String>,
    pub strategy: Option<String>,
    pub outcome: String,
}

impl HealEvent {
    pub fn healed(record: &SelfHealingRecord) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            original_selector: record.original_selector.clone(),
            healed_selector: Some(record.healed_selector.clone()),
            strategy: Some(record.strategy.name().to_string()),
            outcome: "healed".to_string(),
        }
    }

    pub fn exhausted(original_selector: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            original_selector: original_selector.into(),
            healed_selector: None,
            strategy: None,
            outcome: "exhausted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order() {
        let ladder = HealStrategy::ladder();
        assert_eq!(
            ladder,
            vec![
                HealStrategy::Text,
                HealStrategy::Attribute,
                HealStrategy::Structural,
                HealStrategy::Vision,
            ]
        );
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in HealStrategy::ladder() {
            assert_eq!(HealStrategy::from_name(strategy.name()), Some(strategy));
        }
        assert_eq!(HealStrategy::from_name("css"), None);
    }
}
