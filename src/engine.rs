//! Engine facade: one place to wire a driver, healing memory, and an
//! optional reasoner, then hand out assessment passes and retry runs.
//!
//! The engine itself is cheap shared state. Each [`EngineRun`] gets its own
//! healer (so run-scoped heal caches never leak between runs), its own
//! proposer, and its own cancellation token.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use webmend_core_types::{ProjectId, RunId};
use webmend_driver_bridge::BrowserDriver;
use webmend_flow_testability::{
    AssessmentReport, DefaultTestabilityAssessor, FlowSpec, SharedNoticeSink, TestabilityAssessor,
};
use webmend_healing_memory::{HealingMemoryStore, MemoryStatsSnapshot, SharedHealingMemory};
use webmend_reasoning_bridge::SharedReasoning;
use webmend_retry_engine::{
    DefaultAlternativeProposer, RetryOrchestrator, RetryResult, SharedProposer, Submission,
};
use webmend_selector_heal::{DefaultSelectorHealer, HealEvent, SharedHealer};

use crate::config::EngineConfig;

/// Shared wiring for assessment and retry runs.
pub struct Engine {
    driver: Arc<dyn BrowserDriver>,
    memory: SharedHealingMemory,
    reasoner: Option<SharedReasoning>,
    notice_sink: Option<SharedNoticeSink>,
    config: EngineConfig,
    project: ProjectId,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Assessor carrying this engine's thresholds and notice sink.
    pub fn assessor(&self) -> DefaultTestabilityAssessor {
        let mut assessor = DefaultTestabilityAssessor::new(Arc::clone(&self.driver))
            .with_config(self.config.assessor.clone());
        if let Some(sink) = &self.notice_sink {
            assessor = assessor.with_sink(Arc::clone(sink));
        }
        assessor
    }

    /// Assess flows against the live page.
    pub async fn assess(&self, flows: &[FlowSpec]) -> AssessmentReport {
        self.assessor().assess(flows).await
    }

    /// Start a run with no pre-blocked selectors.
    pub fn new_run(&self) -> EngineRun {
        self.start_run(Vec::new())
    }

    /// Start a run that refuses every selector the assessment blocked.
    pub fn new_run_gated(&self, report: &AssessmentReport) -> EngineRun {
        self.start_run(report.blocked_selectors.clone())
    }

    fn start_run(&self, blocked: Vec<String>) -> EngineRun {
        let id = RunId::new();
        let cancel_token = CancellationToken::new();

        let mut healer =
            DefaultSelectorHealer::new(Arc::clone(&self.driver), Arc::clone(&self.memory))
                .with_config(self.config.healing.ladder.clone());
        if let Some(reasoner) = &self.reasoner {
            healer = healer.with_reasoner(Arc::clone(reasoner));
        }
        let healer = Arc::new(healer);

        let mut proposer = DefaultAlternativeProposer::new(Arc::clone(&self.driver));
        if let Some(reasoner) = &self.reasoner {
            proposer = proposer.with_reasoner(Arc::clone(reasoner));
        }

        let orchestrator = RetryOrchestrator::new(Arc::clone(&self.driver), self.project.clone())
            .with_policy(self.config.retry)
            .with_healer(Arc::clone(&healer) as SharedHealer)
            .with_proposer(Arc::new(proposer) as SharedProposer)
            .with_blocked_selectors(blocked)
            .with_cancel_token(cancel_token.clone());

        info!(run = %id, project = %self.project, "run started");
        EngineRun {
            id,
            orchestrator,
            healer,
            cancel_token,
        }
    }

    pub fn memory_stats(&self) -> MemoryStatsSnapshot {
        self.memory.stats()
    }

    /// Flush healing memory to its backing file, when one is configured.
    pub fn persist_memory(&self) -> Result<()> {
        self.memory.persist_now().map_err(Into::into)
    }
}

/// One test run: owns the orchestrator and the run-scoped heal cache.
pub struct EngineRun {
    id: RunId,
    orchestrator: RetryOrchestrator,
    healer: Arc<DefaultSelectorHealer>,
    cancel_token: CancellationToken,
}

impl EngineRun {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Execute one submission through healing, alternatives, and backoff.
    pub async fn submit(&self, submission: Submission) -> RetryResult {
        self.orchestrator.submit(submission).await
    }

    /// Token the orchestrator watches between attempts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the run; in-flight driver calls finish, further attempts do not start.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Heal events recorded during this run, oldest first.
    pub fn heal_events(&self) -> Vec<HealEvent> {
        self.healer.recent_events()
    }
}

/// Builder for [`Engine`]. Only the driver is mandatory.
#[derive(Default)]
pub struct EngineBuilder {
    driver: Option<Arc<dyn BrowserDriver>>,
    memory: Option<SharedHealingMemory>,
    reasoner: Option<SharedReasoning>,
    notice_sink: Option<SharedNoticeSink>,
    config: Option<EngineConfig>,
    project: Option<ProjectId>,
}

impl EngineBuilder {
    pub fn with_driver(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_memory(mut self, memory: SharedHealingMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_reasoner(mut self, reasoner: SharedReasoning) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn with_notice_sink(mut self, sink: SharedNoticeSink) -> Self {
        self.notice_sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    /// Wire the engine. Without an explicit memory, the configured
    /// `memory_path` decides between a persistent and an in-process store.
    pub fn build(self) -> Result<Engine> {
        let driver = self
            .driver
            .ok_or_else(|| anyhow!("engine needs a browser driver"))?;
        let config = self.config.unwrap_or_default();
        let memory: SharedHealingMemory = match self.memory {
            Some(memory) => memory,
            None => match &config.healing.memory_path {
                Some(path) => Arc::new(
                    HealingMemoryStore::with_persistence(path)
                        .with_context(|| format!("opening healing memory at {}", path.display()))?,
                ),
                None => Arc::new(HealingMemoryStore::new()),
            },
        };

        Ok(Engine {
            driver,
            memory,
            reasoner: self.reasoner,
            notice_sink: self.notice_sink,
            config,
            project: self.project.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmend_core_types::ActionContext;
    use webmend_driver_bridge::{Action, ActionKind, PageElement, ScriptedDriver};
    use webmend_flow_testability::Recommendations;

    fn engine_with(driver: Arc<ScriptedDriver>) -> Engine {
        Engine::builder()
            .with_driver(driver as Arc<dyn BrowserDriver>)
            .with_project(ProjectId::from("unit"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_a_driver() {
        let err = Engine::builder().build().unwrap_err();
        assert!(err.to_string().contains("driver"));
    }

    #[test]
    fn test_default_memory_starts_empty() {
        let engine = engine_with(Arc::new(ScriptedDriver::new()));
        let stats = engine.memory_stats();
        assert_eq!(stats.current_entries, 0);
        assert_eq!(stats.total_lookups, 0);
    }

    #[tokio::test]
    async fn test_gated_run_refuses_blocked_selectors() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_element(PageElement::new("#pay", "button").with_text("Pay"));
        let engine = engine_with(Arc::clone(&driver));

        let report = AssessmentReport {
            assessments: Vec::new(),
            recommendations: Recommendations::default(),
            notices: Vec::new(),
            blocked_selectors: vec!["#pay".to_string()],
        };
        let run = engine.new_run_gated(&report);

        let action = Action::new(ActionKind::Click, "Pay").with_selector("#pay");
        let result = run.submit(Submission::new(action)).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(driver.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_ungated_run_executes_normally() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_element(PageElement::new("#pay", "button").with_text("Pay"));
        let engine = engine_with(Arc::clone(&driver));

        let run = engine.new_run();
        let action = Action::new(ActionKind::Click, "Pay").with_selector("#pay");
        let result = run
            .submit(Submission::new(action).in_context(ActionContext::Normal))
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert!(run.heal_events().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_cancellation() {
        let driver = Arc::new(ScriptedDriver::new());
        let engine = engine_with(Arc::clone(&driver));

        let run = engine.new_run();
        run.cancel();
        let action = Action::new(ActionKind::Click, "Pay").with_selector("#pay");
        let result = run.submit(Submission::new(action)).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(driver.execute_count(), 0);
    }
}
