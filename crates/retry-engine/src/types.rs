//! Retry policy and result types

use serde::{Deserialize, Serialize};
use webmend_core_types::ActionContext;
use webmend_driver_bridge::{Action, BoundingBox};
use webmend_selector_heal::SelfHealingRecord;

use crate::errors::RetryError;

/// Attempt ceiling used when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt when none is configured, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Backoff growth factor used when none is configured.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Ceiling any single backoff delay is clamped to, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Attempt budget and backoff shape for one submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Most attempts the orchestrator makes, counting the first
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Growth factor applied to the delay after each further failure
    pub backoff_multiplier: f64,

    /// Ceiling any single delay is clamped to, in milliseconds
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

/// One action handed to the orchestrator, with its gating context
///
/// The optional last-known box is the vision strategy's gravity anchor;
/// callers that tracked the element in an earlier run pass it along so a
/// vanished selector can still be healed by screenshot localization.
#[derive(Debug, Clone)]
pub struct Submission {
    pub action: Action,
    pub context: ActionContext,
    pub last_known_box: Option<BoundingBox>,
}

impl Submission {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            context: ActionContext::default(),
            last_known_box: None,
        }
    }

    pub fn in_context(mut self, context: ActionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_last_known_box(mut self, bounding_box: BoundingBox) -> Self {
        self.last_known_box = Some(bounding_box);
        self
    }
}

/// Outcome of one submission after the recovery machinery ran
#[derive(Debug, Clone, PartialEq)]
pub struct RetryResult {
    /// Whether the in-flight action eventually succeeded
    pub success: bool,

    /// Attempt count reported to the caller
    ///
    /// Zero when the blocked-selector gate rejected the submission before
    /// the driver was touched; a restricted context reports the single
    /// attempt it permits.
    pub attempts: u32,

    /// Heal that replaced the selector during this submission, if any
    pub healing: Option<SelfHealingRecord>,

    /// Alternative action adopted mid-run, if one replaced the original
    pub alternative_action: Option<Action>,

    /// Terminal error when the submission did not succeed
    pub final_error: Option<RetryError>,

    /// Whether automated recovery ran out of attempts
    ///
    /// Distinct from a plain failure: a permanent error or a gate refusal
    /// reports `stuck=false`. A stuck run is the signal to offer the
    /// failure to a manual channel instead of resubmitting.
    pub stuck: bool,
}

impl RetryResult {
    /// Result for an attempt that succeeded.
    pub fn succeeded(attempts: u32) -> Self {
        Self {
            success: true,
            attempts,
            healing: None,
            alternative_action: None,
            final_error: None,
            stuck: false,
        }
    }

    /// Result for a run that ended on a permanent failure or gate refusal.
    pub fn failed(attempts: u32, error: RetryError) -> Self {
        Self {
            success: false,
            attempts,
            healing: None,
            alternative_action: None,
            final_error: Some(error),
            stuck: false,
        }
    }

    /// Result for a run that exhausted its attempt budget.
    pub fn exhausted(attempts: u32, error: RetryError) -> Self {
        Self {
            success: false,
            attempts,
            healing: None,
            alternative_action: None,
            final_error: Some(error),
            stuck: true,
        }
    }

    pub fn with_healing(mut self, healing: Option<SelfHealingRecord>) -> Self {
        self.healing = healing;
        self
    }

    pub fn with_alternative(mut self, alternative: Option<Action>) -> Self {
        self.alternative_action = alternative;
        self
    }
}
