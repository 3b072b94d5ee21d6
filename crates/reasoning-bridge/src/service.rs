//! Reasoning service trait and deterministic mock

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use webmend_driver_bridge::PageElement;

use crate::errors::ReasoningError;
use crate::model::{ProposalContext, ProposedAction};
use crate::parse::parse_proposed_action;

/// Shared handle to a reasoning service implementation.
pub type SharedReasoning = Arc<dyn ReasoningService>;

/// Abstraction over AI-backed reasoning so multiple vendors can plug in.
///
/// The engine treats this as strictly optional: every caller has a
/// non-reasoning fallback path.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Propose one alternative action for a repeatedly failing interaction.
    async fn propose_action(
        &self,
        context: &ProposalContext,
    ) -> Result<ProposedAction, ReasoningError>;

    /// Identify elements in a screenshot for the vision healing strategy.
    ///
    /// Providers without vision support may leave the default, which
    /// reports the capability missing.
    async fn localize_elements(
        &self,
        screenshot: &[u8],
        dom: &str,
        prompt: &str,
    ) -> Result<Vec<PageElement>, ReasoningError> {
        let _ = (screenshot, dom, prompt);
        Err(ReasoningError::unavailable(
            "this provider has no vision capability",
        ))
    }
}

#[derive(Default)]
struct MockState {
    raw_responses: VecDeque<String>,
    localized: VecDeque<Vec<PageElement>>,
    propose_calls: usize,
    localize_calls: usize,
}

/// Deterministic provider used for tests and offline development.
///
/// Scripted raw responses run through the real response parser, so tests
/// exercise the same rejection paths a vendor adapter would.
#[derive(Default)]
pub struct MockReasoningService {
    state: Mutex<MockState>,
}

impl MockReasoningService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw JSON response for the next `propose_action` call.
    pub fn push_raw_response(&self, raw: impl Into<String>) {
        self.state.lock().raw_responses.push_back(raw.into());
    }

    /// Queue elements for the next `localize_elements` call.
    pub fn push_localized(&self, elements: Vec<PageElement>) {
        self.state.lock().localized.push_back(elements);
    }

    pub fn propose_calls(&self) -> usize {
        self.state.lock().propose_calls
    }

    pub fn localize_calls(&self) -> usize {
        self.state.lock().localize_calls
    }
}

#[async_trait]
impl ReasoningService for MockReasoningService {
    async fn propose_action(
        &self,
        context: &ProposalContext,
    ) -> Result<ProposedAction, ReasoningError> {
        let scripted = {
            let mut state = self.state.lock();
            state.propose_calls += 1;
            state.raw_responses.pop_front()
        };
        if let Some(raw) = scripted {
            return parse_proposed_action(&raw);
        }

        // Deterministic fallback: redirect to the first candidate whose text
        // or label contains the target hint.
        let hint = context.failed_action.target_hint.trim().to_lowercase();
        if hint.is_empty() {
            return Err(ReasoningError::unavailable(
                "no scripted response and no target hint to match",
            ));
        }
        let failed_selector = context.failed_action.selector.as_deref();
        let candidate = context.candidates.iter().find(|el| {
            Some(el.selector.as_str()) != failed_selector
                && (contains_ci(el.text.as_deref(), &hint)
                    || contains_ci(el.aria_label.as_deref(), &hint))
        });
        match candidate {
            Some(el) => Ok(ProposedAction::new(
                context.failed_action.retargeted(el.selector.clone()),
                0.8,
            )
            .with_reasoning(format!("element text matches \"{}\"", hint))),
            None => Err(ReasoningError::unavailable(
                "no candidate matches the target hint",
            )),
        }
    }

    async fn localize_elements(
        &self,
        _screenshot: &[u8],
        _dom: &str,
        _prompt: &str,
    ) -> Result<Vec<PageElement>, ReasoningError> {
        let mut state = self.state.lock();
        state.localize_calls += 1;
        Ok(state.localized.pop_front().unwrap_or_default())
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}
