//! Retry orchestration state machine
//!
//! One submission runs strictly sequentially: execute, classify, recover,
//! back off, repeat. Healing is tried once after the first failure and a
//! single alternative proposal may be adopted from the second failure on;
//! both shortcut the backoff delay because the page state that justified
//! waiting has already changed.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webmend_core_types::ProjectId;
use webmend_driver_bridge::{Action, BoundingBox, BrowserDriver};
use webmend_selector_heal::{HealOutcome, HealRequest, SelfHealingRecord, SharedHealer};

use crate::alternatives::{differs_materially, SharedProposer};
use crate::backoff::delay_for_attempt;
use crate::errors::RetryError;
use crate::types::{RetryPolicy, RetryResult, Submission};

/// Drives one action through attempts, healing, alternatives, and backoff.
///
/// Each test run owns its own orchestrator; the in-run healing cache lives
/// in the shared healer, so a selector healed for one action is substituted
/// for every later action in the same run.
pub struct RetryOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    project: ProjectId,
    policy: RetryPolicy,
    healer: Option<SharedHealer>,
    proposer: Option<SharedProposer>,
    blocked_selectors: HashSet<String>,
    cancel_token: CancellationToken,
}

impl RetryOrchestrator {
    pub fn new(driver: Arc<dyn BrowserDriver>, project: ProjectId) -> Self {
        Self {
            driver,
            project,
            policy: RetryPolicy::default(),
            healer: None,
            proposer: None,
            blocked_selectors: HashSet::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_healer(mut self, healer: SharedHealer) -> Self {
        self.healer = Some(healer);
        self
    }

    pub fn with_proposer(mut self, proposer: SharedProposer) -> Self {
        self.proposer = Some(proposer);
        self
    }

    /// Selectors a testability assessment marked as blocked.
    ///
    /// Submissions targeting any of them are refused without touching the
    /// driver.
    pub fn with_blocked_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Run one submission to a terminal result.
    pub async fn submit(&self, submission: Submission) -> RetryResult {
        let Submission {
            action,
            context,
            last_known_box,
        } = submission;

        // Restricted contexts get no recovery machinery at all; the caller
        // executes such actions through its own confirmed channel.
        if context.is_restricted() {
            warn!(
                kind = action.kind.name(),
                context = context.name(),
                "restricted context; refusing automated recovery"
            );
            return RetryResult::failed(1, RetryError::ContextForbidden);
        }

        if let Some(selector) = action.selector.as_deref() {
            if self.blocked_selectors.contains(selector) {
                warn!(selector, "selector blocked by assessment; not attempting");
                return RetryResult::failed(0, RetryError::SelectorBlocked(selector.to_string()));
            }
        }

        self.run_attempts(action, last_known_box).await
    }

    async fn run_attempts(
        &self,
        action: Action,
        last_known_box: Option<BoundingBox>,
    ) -> RetryResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut current = action;
        let mut healing: Option<SelfHealingRecord> = None;
        let mut alternative: Option<Action> = None;
        let mut proposal_spent = false;
        let mut attempt: u32 = 0;

        loop {
            if self.cancel_token.is_cancelled() {
                debug!(attempt, "cancelled between attempts");
                return RetryResult::failed(attempt, RetryError::Cancelled)
                    .with_healing(healing)
                    .with_alternative(alternative);
            }
            attempt += 1;

            // Substitute a heal accepted earlier in this run, if any.
            if healing.is_none() {
                healing = self.cached_heal_for(&current);
            }
            let effective = match &healing {
                Some(record) => current.retargeted(record.healed_selector.clone()),
                None => current.clone(),
            };

            let err = match self.driver.execute(&effective).await {
                Ok(receipt) => {
                    info!(
                        attempt,
                        kind = effective.kind.name(),
                        latency_ms = receipt.latency_ms,
                        healed = healing.is_some(),
                        "action succeeded"
                    );
                    return RetryResult::succeeded(attempt)
                        .with_healing(healing)
                        .with_alternative(alternative);
                }
                Err(err) => err,
            };

            let retryable = err.is_retryable();
            debug!(attempt, error = %err, retryable, "attempt failed");
            if !retryable {
                return RetryResult::failed(attempt, RetryError::Driver(err))
                    .with_healing(healing)
                    .with_alternative(alternative);
            }
            if attempt >= max_attempts {
                info!(
                    attempts = attempt,
                    error = %err,
                    "automated recovery exhausted; reporting stuck"
                );
                return RetryResult::exhausted(attempt, RetryError::Driver(err))
                    .with_healing(healing)
                    .with_alternative(alternative);
            }

            // First failure on a selector: climb the healing ladder and, on
            // success, go straight into the next attempt.
            if attempt == 1 && healing.is_none() {
                if let Some(record) = self.try_heal(&current, last_known_box).await {
                    healing = Some(record);
                    continue;
                }
            }

            // From the second failure on, a single alternative strategy may
            // replace the in-flight action outright.
            if attempt >= 2 && !proposal_spent {
                if let Some(proposer) = &self.proposer {
                    proposal_spent = true;
                    if let Some(proposed) = proposer.propose(&current, &err).await {
                        if self.adoptable(&proposed, &current) {
                            info!(
                                from_kind = current.kind.name(),
                                to_kind = proposed.kind.name(),
                                to_selector = proposed.selector.as_deref().unwrap_or("-"),
                                "adopting alternative action"
                            );
                            current = proposed.clone();
                            alternative = Some(proposed);
                            healing = None;
                            continue;
                        }
                        debug!("proposal not adoptable; keeping the current action");
                    }
                }
            }

            let delay = delay_for_attempt(&self.policy, attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "backing off before next attempt"
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.cancel_token.cancelled() => {
                    debug!(attempt, "cancelled during backoff");
                    return RetryResult::failed(attempt, RetryError::Cancelled)
                        .with_healing(healing)
                        .with_alternative(alternative);
                }
            }
        }
    }

    fn cached_heal_for(&self, action: &Action) -> Option<SelfHealingRecord> {
        let healer = self.healer.as_ref()?;
        let selector = action.selector.as_deref()?;
        let record = healer.cached_heal(selector)?;
        debug!(
            original = selector,
            healed = %record.healed_selector,
            "substituting selector healed earlier in this run"
        );
        Some(record)
    }

    async fn try_heal(
        &self,
        action: &Action,
        last_known_box: Option<BoundingBox>,
    ) -> Option<SelfHealingRecord> {
        let healer = self.healer.as_ref()?;
        action.selector.as_deref()?;

        let mut request = HealRequest::new(action.clone(), self.project.clone());
        if let Some(bounding_box) = last_known_box {
            request = request.with_last_known_box(bounding_box);
        }

        match healer.heal(&request).await {
            Ok(HealOutcome::Healed(record)) => {
                info!(
                    original = %record.original_selector,
                    healed = %record.healed_selector,
                    strategy = record.strategy.name(),
                    "selector healed; retrying immediately"
                );
                Some(record)
            }
            Ok(HealOutcome::Skipped { reason }) => {
                debug!(reason, "healing skipped");
                None
            }
            Ok(HealOutcome::Exhausted { tried }) => {
                debug!(candidates = tried.len(), "healing ladder exhausted");
                None
            }
            Err(err) => {
                warn!(error = %err, "healing failed; continuing with retries");
                None
            }
        }
    }

    /// A proposal is adopted only when it changes what gets executed and
    /// does not walk into a blocked selector.
    fn adoptable(&self, proposed: &Action, current: &Action) -> bool {
        if !differs_materially(proposed, current) {
            return false;
        }
        if let Some(selector) = proposed.selector.as_deref() {
            if self.blocked_selectors.contains(selector) {
                debug!(selector, "proposal targets a blocked selector; rejected");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;
    use webmend_core_types::ActionContext;
    use webmend_driver_bridge::{ActionKind, DriverError, PageElement, ScriptedDriver};
    use webmend_healing_memory::HealingMemoryStore;
    use webmend_selector_heal::{DefaultSelectorHealer, HealStrategy};

    use crate::alternatives::{AlternativeProposer, DefaultAlternativeProposer};

    fn orchestrator_parts() -> (Arc<ScriptedDriver>, ProjectId) {
        (Arc::new(ScriptedDriver::new()), ProjectId::from("proj"))
    }

    fn orchestrator_for(driver: &Arc<ScriptedDriver>, project: ProjectId) -> RetryOrchestrator {
        RetryOrchestrator::new(Arc::clone(driver) as Arc<dyn BrowserDriver>, project)
    }

    fn healer_for(driver: &Arc<ScriptedDriver>) -> SharedHealer {
        let memory = Arc::new(HealingMemoryStore::new());
        Arc::new(DefaultSelectorHealer::new(
            Arc::clone(driver) as Arc<dyn BrowserDriver>,
            memory,
        ))
    }

    struct CountingProposer {
        calls: AtomicUsize,
        proposal: Option<Action>,
    }

    impl CountingProposer {
        fn new(proposal: Option<Action>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                proposal,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AlternativeProposer for CountingProposer {
        async fn propose(&self, _failed: &Action, _error: &DriverError) -> Option<Action> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.proposal.clone()
        }
    }

    #[tokio::test]
    async fn test_clean_first_attempt_skips_all_machinery() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#ok", "button").with_text("Ok"));

        let orchestrator = orchestrator_for(&driver, project)
            .with_healer(healer_for(&driver));
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Ok").with_selector("#ok"),
            ))
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.healing.is_none());
        assert!(result.alternative_action.is_none());
        assert!(!result.stuck);
        assert_eq!(driver.execute_count(), 1);
        // The healing ladder never probed the page.
        assert_eq!(driver.calls_with_prefix("query_elements"), 0);
    }

    #[tokio::test]
    async fn test_safety_critical_context_refuses_recovery() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#pay", "button").with_text("Pay"));

        let orchestrator = orchestrator_for(&driver, project)
            .with_policy(RetryPolicy::default().with_max_attempts(5))
            .with_healer(healer_for(&driver))
            .with_proposer(Arc::new(DefaultAlternativeProposer::new(
                Arc::clone(&driver) as Arc<dyn BrowserDriver>,
            )));

        let result = orchestrator
            .submit(
                Submission::new(Action::new(ActionKind::Click, "Pay").with_selector("#pay"))
                    .in_context(ActionContext::SafetyCritical),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert!(!result.stuck);
        assert_eq!(result.final_error, Some(RetryError::ContextForbidden));
        assert_eq!(driver.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_blocked_selector_is_refused_without_attempts() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#checkout", "button").with_text("Checkout"));

        let orchestrator = orchestrator_for(&driver, project)
            .with_blocked_selectors(["#checkout"]);
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Checkout").with_selector("#checkout"),
            ))
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert!(!result.stuck);
        assert_eq!(
            result.final_error,
            Some(RetryError::SelectorBlocked("#checkout".to_string()))
        );
        assert_eq!(driver.execute_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heal_on_second_attempt_without_backoff() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#submit-btn", "button").with_text("Submit"));

        let orchestrator = orchestrator_for(&driver, project)
            .with_healer(healer_for(&driver));
        let action = Action::new(ActionKind::Click, "Submit").with_selector("#submit-1234");

        let started = Instant::now();
        let result = orchestrator.submit(Submission::new(action)).await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        let healing = result.healing.unwrap();
        assert_eq!(healing.strategy, HealStrategy::Text);
        assert_eq!(healing.original_selector, "#submit-1234");
        assert_eq!(healing.healed_selector, "text=\"Submit\"");
        assert!(result.alternative_action.is_none());
        // Healed retries skip the backoff delay entirely.
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(driver.execute_count(), 2);
    }

    #[tokio::test]
    async fn test_healed_selector_reused_for_later_submissions() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#login-btn", "button").with_text("Log in"));

        let orchestrator = orchestrator_for(&driver, project)
            .with_healer(healer_for(&driver));
        let action = Action::new(ActionKind::Click, "Log in").with_selector("#login-1234");

        let first = orchestrator.submit(Submission::new(action.clone())).await;
        assert!(first.success);
        assert_eq!(first.attempts, 2);

        // The run cache feeds the substitution, so the second submission
        // never re-fails on the stale selector.
        let second = orchestrator.submit(Submission::new(action)).await;
        assert!(second.success);
        assert_eq!(second.attempts, 1);
        let healing = second.healing.unwrap();
        assert_eq!(healing.healed_selector, "text=\"Log in\"");
        assert_eq!(driver.execute_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_alternative_adopted_for_invisible_target() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(
            PageElement::new("#buy", "button")
                .with_text("Buy")
                .with_visibility(false),
        );

        let orchestrator = orchestrator_for(&driver, project)
            .with_proposer(Arc::new(DefaultAlternativeProposer::new(
                Arc::clone(&driver) as Arc<dyn BrowserDriver>,
            )));

        let started = Instant::now();
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Buy").with_selector("#buy"),
            ))
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        let adopted = result.alternative_action.unwrap();
        assert_eq!(adopted.kind, ActionKind::Scroll);
        assert_eq!(adopted.selector.as_deref(), Some("#buy"));
        // One backoff before attempt 2; adoption then retries immediately.
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternatives_proposed_at_most_once() {
        let (driver, project) = orchestrator_parts();
        let proposer = Arc::new(CountingProposer::new(None));

        let orchestrator = orchestrator_for(&driver, project)
            .with_policy(RetryPolicy::default().with_max_attempts(4))
            .with_proposer(Arc::clone(&proposer) as SharedProposer);
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Gone").with_selector("#gone"),
            ))
            .await;

        assert!(!result.success);
        assert!(result.stuck);
        assert_eq!(result.attempts, 4);
        assert_eq!(proposer.calls(), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_terminal_and_not_stuck() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#a", "button").with_text("A"));
        driver.fail_next("#a", DriverError::Protocol("session closed".to_string()));

        let orchestrator = orchestrator_for(&driver, project)
            .with_policy(RetryPolicy::default().with_max_attempts(5));
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "A").with_selector("#a"),
            ))
            .await;

        assert!(!result.success);
        assert!(!result.stuck);
        assert_eq!(result.attempts, 1);
        assert!(matches!(
            result.final_error,
            Some(RetryError::Driver(DriverError::Protocol(_)))
        ));
        assert_eq!(driver.execute_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_stuck_with_last_error() {
        let (driver, project) = orchestrator_parts();

        let orchestrator = orchestrator_for(&driver, project);
        let started = Instant::now();
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Gone").with_selector("#gone"),
            ))
            .await;

        assert!(!result.success);
        assert!(result.stuck);
        assert_eq!(result.attempts, 3);
        assert!(matches!(
            result.final_error,
            Some(RetryError::Driver(DriverError::NotFound(_)))
        ));
        // Two backoffs: 500ms then 1000ms.
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_follow_the_policy() {
        let (driver, project) = orchestrator_parts();

        let orchestrator = orchestrator_for(&driver, project)
            .with_policy(RetryPolicy::default().with_max_attempts(5));
        let started = Instant::now();
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Gone").with_selector("#gone"),
            ))
            .await;

        assert_eq!(result.attempts, 5);
        // 500 + 1000 + 2000 + 4000, no delay after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(7500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let (driver, project) = orchestrator_parts();
        let token = CancellationToken::new();

        let orchestrator = orchestrator_for(&driver, project)
            .with_cancel_token(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(600)).await;
            canceller.cancel();
        });

        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Gone").with_selector("#gone"),
            ))
            .await;

        assert!(!result.success);
        assert!(!result.stuck);
        assert_eq!(result.final_error, Some(RetryError::Cancelled));
        assert_eq!(result.attempts, 2);
        assert_eq!(driver.execute_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adoption_rejects_blocked_selectors() {
        let (driver, project) = orchestrator_parts();
        driver.add_element(PageElement::new("#alt", "button").with_text("Alt"));
        let proposer = Arc::new(CountingProposer::new(Some(
            Action::new(ActionKind::Click, "Alt").with_selector("#alt"),
        )));

        let orchestrator = orchestrator_for(&driver, project)
            .with_proposer(Arc::clone(&proposer) as SharedProposer)
            .with_blocked_selectors(["#alt"]);
        let result = orchestrator
            .submit(Submission::new(
                Action::new(ActionKind::Click, "Gone").with_selector("#gone"),
            ))
            .await;

        assert!(!result.success);
        assert!(result.stuck);
        assert!(result.alternative_action.is_none());
        assert_eq!(proposer.calls(), 1);
    }
}
