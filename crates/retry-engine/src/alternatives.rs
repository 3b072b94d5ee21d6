//! Alternative interaction proposals for repeatedly failing actions
//!
//! When retries on the same selector keep failing, the orchestrator asks
//! for a different way to accomplish the intent. A reasoning service is
//! consulted first when one is configured; the heuristic ladder below is
//! always available and needs nothing beyond the driver.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use webmend_driver_bridge::{Action, ActionKind, BrowserDriver, DriverError, PageElement};
use webmend_reasoning_bridge::{ProposalContext, SharedReasoning, MAX_PROMPT_CANDIDATES};

/// Shortest candidate text accepted as evidence for a substitution.
///
/// Guards the containment scan against one- and two-letter fragments that
/// would match almost any description.
pub const MIN_TEXT_MATCH_LEN: usize = 3;

/// Proposes a different interaction for an action that keeps failing.
#[async_trait]
pub trait AlternativeProposer: Send + Sync {
    /// Propose an alternative, or `None` when nothing better is available.
    async fn propose(&self, failed: &Action, error: &DriverError) -> Option<Action>;
}

/// Shared handle to a proposer implementation.
pub type SharedProposer = Arc<dyn AlternativeProposer>;

/// Whether adopting the proposal would change what gets executed.
///
/// Target hints and descriptions are advisory, so two actions differing
/// only there are still the same interaction.
pub fn differs_materially(proposed: &Action, current: &Action) -> bool {
    proposed.kind != current.kind
        || proposed.selector != current.selector
        || proposed.value != current.value
}

/// Dependency-free proposal ladder.
///
/// Rungs, in order: scroll an invisible click target into view; substitute
/// an element whose visible text matches the action's description; fall
/// back to any interactive element the action kind can operate on.
pub fn heuristic_alternative(
    failed: &Action,
    error: &DriverError,
    candidates: &[PageElement],
) -> Option<Action> {
    // An invisible click target usually just needs to be brought into view.
    if failed.kind == ActionKind::Click && error.is_visibility_failure() {
        if let Some(selector) = failed.selector.as_deref() {
            debug!(selector, "proposing scroll for invisible click target");
            return Some(
                Action::new(ActionKind::Scroll, failed.target_hint.clone())
                    .with_selector(selector)
                    .with_description(format!("scroll {} into view", selector)),
            );
        }
    }

    let failed_selector = failed.selector.as_deref();
    let actionable = |el: &&PageElement| {
        el.visible && el.enabled && Some(el.selector.as_str()) != failed_selector
    };

    // Same intent, different element: match on the description text.
    let description = normalized(&failed.description)
        .or_else(|| normalized(&failed.target_hint));
    if let Some(description) = description {
        let matched = candidates.iter().filter(actionable).find(|el| {
            texts_relate(el.text.as_deref(), &description)
                || texts_relate(el.aria_label.as_deref(), &description)
        });
        if let Some(el) = matched {
            debug!(selector = %el.selector, "substituting element matched by description text");
            return Some(failed.retargeted(el.selector.clone()));
        }
    }

    // Last resort: any interactive element this kind of action can land on.
    let compatible = candidates
        .iter()
        .filter(actionable)
        .find(|el| failed.kind.accepts_element(&el.tag, el.input_type.as_deref()));
    if let Some(el) = compatible {
        debug!(selector = %el.selector, tag = %el.tag, "substituting type-compatible element");
        return Some(failed.retargeted(el.selector.clone()));
    }

    None
}

fn normalized(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Case-insensitive containment in either direction, with a length floor
/// on the contained side.
fn texts_relate(candidate: Option<&str>, description: &str) -> bool {
    let candidate = match candidate.and_then(|t| normalized(t)) {
        Some(text) => text,
        None => return false,
    };
    (candidate.len() >= MIN_TEXT_MATCH_LEN && description.contains(&candidate))
        || (description.len() >= MIN_TEXT_MATCH_LEN && candidate.contains(description))
}

/// Reasoning-first proposer with the heuristic ladder as fallback
pub struct DefaultAlternativeProposer {
    driver: Arc<dyn BrowserDriver>,
    reasoner: Option<SharedReasoning>,
}

impl DefaultAlternativeProposer {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            reasoner: None,
        }
    }

    pub fn with_reasoner(mut self, reasoner: SharedReasoning) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    async fn reasoned_alternative(
        &self,
        reasoner: &SharedReasoning,
        failed: &Action,
        error: &DriverError,
        candidates: Vec<PageElement>,
    ) -> Option<Action> {
        let page_url = self.driver.current_url().await.unwrap_or_default();
        let context = ProposalContext::new(failed.clone(), error.to_string())
            .with_candidates(candidates)
            .with_page_url(page_url);

        match reasoner.propose_action(&context).await {
            Ok(proposal) => {
                if differs_materially(&proposal.action, failed) {
                    debug!(
                        confidence = proposal.confidence,
                        "reasoned alternative accepted"
                    );
                    Some(proposal.action)
                } else {
                    debug!("reasoned proposal repeats the failed action; rejected");
                    None
                }
            }
            Err(err) => {
                debug!(error = %err, "reasoned proposal unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl AlternativeProposer for DefaultAlternativeProposer {
    async fn propose(&self, failed: &Action, error: &DriverError) -> Option<Action> {
        let candidates = match self.driver.snapshot_elements(MAX_PROMPT_CANDIDATES).await {
            Ok(elements) => elements,
            Err(err) => {
                warn!(error = %err, "element snapshot failed; proposing without candidates");
                Vec::new()
            }
        };

        if let Some(reasoner) = &self.reasoner {
            if let Some(action) = self
                .reasoned_alternative(reasoner, failed, error, candidates.clone())
                .await
            {
                return Some(action);
            }
        }

        heuristic_alternative(failed, error, &candidates)
    }
}
