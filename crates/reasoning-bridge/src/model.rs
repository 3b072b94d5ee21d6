//! Request and response shapes for reasoning calls

use serde::{Deserialize, Serialize};
use webmend_driver_bridge::{Action, PageElement};

/// Everything a provider needs to propose a different interaction
#[derive(Debug, Clone)]
pub struct ProposalContext {
    /// The action that kept failing
    pub failed_action: Action,

    /// Driver error text from the last attempt
    pub error_text: String,

    /// Interactive elements currently on the page
    ///
    /// The prompt builder caps how many of these reach the provider.
    pub candidates: Vec<PageElement>,

    /// URL of the page the failure happened on
    pub page_url: String,
}

impl ProposalContext {
    pub fn new(failed_action: Action, error_text: impl Into<String>) -> Self {
        Self {
            failed_action,
            error_text: error_text.into(),
            candidates: Vec::new(),
            page_url: String::new(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<PageElement>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }
}

/// A structured alternative returned by the provider
///
/// `confidence` is mandatory; responses without one are rejected at parse
/// time rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action: Action,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ProposedAction {
    pub fn new(action: Action, confidence: f64) -> Self {
        Self {
            action,
            confidence,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}
