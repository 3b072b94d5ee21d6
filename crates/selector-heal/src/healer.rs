//! Healing ladder driver
//!
//! Runs the escalation ladder against a failing selector: memory replay
//! first, then text, attribute, structural, and (when a reasoning service
//! is wired in) vision. Every candidate is verified against the live page
//! before acceptance, and every acceptance is cached for the rest of the
//! run and persisted to the memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use webmend_driver_bridge::BrowserDriver;
use webmend_healing_memory::{PageSignature, SharedHealingMemory};
use webmend_reasoning_bridge::SharedReasoning;

use crate::errors::HealError;
use crate::strategies::{AttributeTactic, HealTactic, StructuralTactic, TextTactic};
use crate::types::{HealEvent, HealOutcome, HealRequest, HealStrategy, SelfHealingRecord};
use crate::vision::VisionTactic;

/// Confidence assigned to a heal replayed from the memory store.
const MEMORY_REPLAY_CONFIDENCE: f64 = 0.9;

/// Cap on retained heal events.
const MAX_HEAL_EVENTS: usize = 200;

/// Elements resolved per candidate during verification.
const VERIFY_QUERY_LIMIT: usize = 10;

/// Tunables for the healing ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Gravity radius for the vision strategy, in pixels
    pub vision_radius_px: f64,

    /// Minimum comfortable tap target side, in pixels
    pub min_tap_size_px: f64,

    /// Candidates verified per strategy before moving to the next rung
    pub max_candidates_per_tactic: usize,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            vision_radius_px: crate::vision::DEFAULT_VISION_RADIUS_PX,
            min_tap_size_px: crate::vision::DEFAULT_MIN_TAP_SIZE_PX,
            max_candidates_per_tactic: 10,
        }
    }
}

/// Selector healing interface
#[async_trait]
pub trait SelectorHealer: Send + Sync {
    /// Run the healing ladder for a failing action.
    async fn heal(&self, request: &HealRequest) -> Result<HealOutcome, HealError>;

    /// Heal already accepted earlier in this run for the selector, if any.
    fn cached_heal(&self, original_selector: &str) -> Option<SelfHealingRecord>;
}

/// Shared handle to a healer implementation.
pub type SharedHealer = Arc<dyn SelectorHealer>;

/// Default ladder implementation backed by a driver and the memory store
pub struct DefaultSelectorHealer {
    driver: Arc<dyn BrowserDriver>,
    memory: SharedHealingMemory,
    reasoner: Option<SharedReasoning>,
    config: HealConfig,
    /// Accepted heals for this run, keyed by original selector.
    run_cache: RwLock<HashMap<String, SelfHealingRecord>>,
    events: RwLock<Vec<HealEvent>>,
}

impl DefaultSelectorHealer {
    pub fn new(driver: Arc<dyn BrowserDriver>, memory: SharedHealingMemory) -> Self {
        Self {
            driver,
            memory,
            reasoner: None,
            config: HealConfig::default(),
            run_cache: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Enable the vision rung by wiring in a reasoning service.
    pub fn with_reasoner(mut self, reasoner: SharedReasoning) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn with_config(mut self, config: HealConfig) -> Self {
        self.config = config;
        self
    }

    /// Recent heal events, oldest first.
    pub fn recent_events(&self) -> Vec<HealEvent> {
        self.events.read().clone()
    }

    /// Build the strategy ladder for one heal pass.
    ///
    /// Vision joins only when a reasoning service is configured; the
    /// cheaper strategies always run first.
    fn ladder(&self) -> Vec<Box<dyn HealTactic>> {
        let mut tactics: Vec<Box<dyn HealTactic>> = vec![
            Box::new(TextTactic),
            Box::new(AttributeTactic),
            Box::new(StructuralTactic),
        ];
        if let Some(reasoner) = &self.reasoner {
            tactics.push(Box::new(
                VisionTactic::new(Arc::clone(&self.driver), Arc::clone(reasoner))
                    .with_radius(self.config.vision_radius_px)
                    .with_min_tap_size(self.config.min_tap_size_px),
            ));
        }
        tactics
    }

    /// Signature of the page as it currently stands, for memory keying.
    async fn page_signature(&self) -> Option<PageSignature> {
        let url = match self.driver.current_url().await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "cannot read current url, memory lookup skipped");
                return None;
            }
        };
        let dom = match self.driver.capture_dom().await {
            Ok(dom) => dom,
            Err(err) => {
                warn!(error = %err, "cannot capture dom, memory lookup skipped");
                return None;
            }
        };
        Some(PageSignature::compute(&url, &dom))
    }

    /// A candidate is accepted only if it resolves to at least one visible,
    /// enabled element right now.
    async fn verify_candidate(&self, selector: &str) -> bool {
        match self.driver.query_elements(selector, VERIFY_QUERY_LIMIT).await {
            Ok(elements) => elements.iter().any(|el| el.visible && el.enabled),
            Err(err) => {
                debug!(selector, error = %err, "candidate failed to resolve");
                false
            }
        }
    }

    /// Replay a remembered heal when it still verifies against the page.
    async fn replay_from_memory(
        &self,
        request: &HealRequest,
        original: &str,
        signature: &PageSignature,
    ) -> Option<SelfHealingRecord> {
        let remembered = self.memory.get(&request.project, signature, original)?;
        let Some(strategy) = HealStrategy::from_name(&remembered.strategy) else {
            warn!(
                strategy = %remembered.strategy,
                "remembered heal has unknown strategy, running the ladder instead"
            );
            return None;
        };
        if !self.verify_candidate(&remembered.healed_selector).await {
            debug!(
                original,
                healed = %remembered.healed_selector,
                "remembered heal no longer verifies"
            );
            return None;
        }

        // Reinforce so the entry keeps winning future lookups.
        self.memory.upsert_increment(
            &request.project,
            signature,
            original,
            &remembered.healed_selector,
            strategy.name(),
        );
        Some(SelfHealingRecord {
            strategy,
            original_selector: original.to_string(),
            healed_selector: remembered.healed_selector,
            confidence: MEMORY_REPLAY_CONFIDENCE,
            note: format!(
                "replayed from memory ({} prior successes)",
                remembered.success_count
            ),
            from_memory: true,
        })
    }

    fn accept(&self, record: &SelfHealingRecord) {
        self.run_cache
            .write()
            .insert(record.original_selector.clone(), record.clone());
        self.push_event(HealEvent::healed(record));
        info!(
            original = %record.original_selector,
            healed = %record.healed_selector,
            strategy = record.strategy.name(),
            confidence = record.confidence,
            from_memory = record.from_memory,
            "selector healed"
        );
    }

    fn push_event(&self, event: HealEvent) {
        let mut events = self.events.write();
        events.push(event);
        let overflow = events.len().saturating_sub(MAX_HEAL_EVENTS);
        if overflow > 0 {
            events.drain(..overflow);
        }
    }
}

#[async_trait]
impl SelectorHealer for DefaultSelectorHealer {
    async fn heal(&self, request: &HealRequest) -> Result<HealOutcome, HealError> {
        let Some(original) = request.original_selector() else {
            return Ok(HealOutcome::Skipped {
                reason: "action has no selector to heal".to_string(),
            });
        };

        // Run cache first: a heal accepted earlier in this run is reused as
        // long as it still verifies.
        let cached = self.run_cache.read().get(original).cloned();
        if let Some(record) = cached {
            if self.verify_candidate(&record.healed_selector).await {
                debug!(original, healed = %record.healed_selector, "run cache hit");
                return Ok(HealOutcome::Healed(record));
            }
            debug!(original, "cached heal went stale, evicting");
            self.run_cache.write().remove(original);
        }

        // Memory store next; recomputation is the fallback, not the default.
        let signature = self.page_signature().await;
        if let Some(signature) = &signature {
            if let Some(record) = self.replay_from_memory(request, original, signature).await {
                self.accept(&record);
                return Ok(HealOutcome::Healed(record));
            }
        }

        let mut tried = Vec::new();
        for tactic in self.ladder() {
            let mut candidates = match tactic.candidates(request).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(strategy = tactic.name(), error = %err, "healing strategy failed");
                    continue;
                }
            };
            candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            candidates.truncate(self.config.max_candidates_per_tactic);

            for candidate in candidates {
                if candidate.selector == original {
                    continue;
                }
                tried.push(candidate.selector.clone());
                if !self.verify_candidate(&candidate.selector).await {
                    continue;
                }

                let record = SelfHealingRecord {
                    strategy: tactic.strategy(),
                    original_selector: original.to_string(),
                    healed_selector: candidate.selector,
                    confidence: candidate.confidence,
                    note: candidate.note,
                    from_memory: false,
                };
                if let Some(signature) = &signature {
                    self.memory.upsert_increment(
                        &request.project,
                        signature,
                        original,
                        &record.healed_selector,
                        record.strategy.name(),
                    );
                }
                self.accept(&record);
                return Ok(HealOutcome::Healed(record));
            }
        }

        info!(original, tried = tried.len(), "healing ladder exhausted");
        self.push_event(HealEvent::exhausted(original));
        Ok(HealOutcome::Exhausted { tried })
    }

    fn cached_heal(&self, original_selector: &str) -> Option<SelfHealingRecord> {
        self.run_cache.read().get(original_selector).cloned()
    }
}
