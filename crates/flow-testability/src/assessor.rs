//! Flow testability assessor
//!
//! Scores named flows against the live page before any of them run, so
//! callers can skip flows that would only burn retries. Flows whose
//! confidence collapses while still nominally testable trip the
//! hallucination guard and are forced non-testable.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use webmend_driver_bridge::BrowserDriver;

use crate::checks::ElementChecker;
use crate::notify::SharedNoticeSink;
use crate::root_cause::RootCauseAnalyzer;
use crate::types::{
    AssessmentReport, Blocker, BlockerKind, FlowAssessment, FlowSpec, LowConfidenceNotice,
    Recommendations, RootCause, RootCauseKind, Verdict, WarningKind,
};

/// Assessment thresholds and sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    /// Below this, a still-testable flow is forced non-testable
    pub low_confidence_threshold: f64,

    /// At or above this, a testable flow is classified ready
    pub testable_threshold: f64,

    /// Below this (or on any blocker), deep root-cause probes run
    pub deep_check_threshold: f64,

    /// Minimum comfortable interactive size, in pixels
    pub min_interactive_size_px: f64,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.4,
            testable_threshold: 0.7,
            deep_check_threshold: 0.5,
            min_interactive_size_px: 20.0,
        }
    }
}

/// Flow assessment interface
#[async_trait]
pub trait TestabilityAssessor: Send + Sync {
    /// Assess a set of flows against the live page.
    async fn assess(&self, flows: &[FlowSpec]) -> AssessmentReport;
}

/// Default assessor backed by a browser driver
pub struct DefaultTestabilityAssessor {
    driver: Arc<dyn BrowserDriver>,
    config: AssessorConfig,
    sink: Option<SharedNoticeSink>,
    /// Flows already notified, so the sink sees each one at most once.
    notified_flows: Mutex<HashSet<String>>,
}

impl DefaultTestabilityAssessor {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            config: AssessorConfig::default(),
            sink: None,
            notified_flows: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_config(mut self, config: AssessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: SharedNoticeSink) -> Self {
        self.sink = Some(sink);
        self
    }

    async fn assess_flow(&self, flow: &FlowSpec) -> (FlowAssessment, Option<LowConfidenceNotice>) {
        let checker = ElementChecker::new(
            Arc::clone(&self.driver),
            self.config.min_interactive_size_px,
        );

        let mut element_refs = Vec::new();
        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        let mut confidence_sum = 0.0;
        // Worst element drives the diagnosis: first blocked one, else the
        // lowest-confidence one.
        let mut diagnosis_target: Option<(String, f64, bool)> = None;
        let mut first_blocked: Option<(String, bool)> = None;

        for element in &flow.elements {
            element_refs.push(element.selector.clone());
            let check = checker.check_element(element).await;
            let element_confidence = check.element_confidence();
            confidence_sum += element_confidence;

            let weak = check
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::WeakIdentification);
            if check.has_blocker && first_blocked.is_none() {
                first_blocked = Some((element.selector.clone(), weak));
            }
            let is_worse = diagnosis_target
                .as_ref()
                .map(|(_, current, _)| element_confidence < *current)
                .unwrap_or(true);
            if is_worse {
                diagnosis_target = Some((element.selector.clone(), element_confidence, weak));
            }

            blockers.extend(check.blockers);
            warnings.extend(check.warnings);
        }

        let mut confidence = if flow.elements.is_empty() {
            0.0
        } else {
            (confidence_sum / flow.elements.len() as f64).clamp(0.0, 1.0)
        };
        let mut can_test = blockers.is_empty();
        if !can_test {
            confidence = 0.0;
        }

        // Hallucination guard: a nominally testable flow this weak is more
        // likely a planner fabrication than a usable flow.
        let mut guard_tripped = false;
        if can_test && confidence < self.config.low_confidence_threshold {
            guard_tripped = true;
            can_test = false;
            let guard_selector = diagnosis_target
                .as_ref()
                .map(|(selector, _, _)| selector.clone())
                .unwrap_or_default();
            blockers.push(Blocker::new(
                BlockerKind::LowConfidence,
                guard_selector,
                format!(
                    "flow confidence {confidence:.2} fell below the {:.2} guard",
                    self.config.low_confidence_threshold
                ),
            ));
            debug!(flow = %flow.name, confidence, "hallucination guard tripped");
        }

        let verdict = if !can_test {
            Verdict::NonTestable
        } else if confidence >= self.config.testable_threshold {
            Verdict::Testable
        } else {
            Verdict::HighRisk
        };

        let root_cause = if verdict == Verdict::Testable {
            None
        } else {
            Some(self.diagnose_flow(confidence, &blockers, first_blocked, diagnosis_target).await)
        };

        let notice = guard_tripped.then(|| LowConfidenceNotice {
            flow: flow.name.clone(),
            confidence,
            root_cause: root_cause.clone(),
        });

        let assessment = FlowAssessment {
            name: flow.name.clone(),
            element_refs,
            confidence,
            can_test,
            blockers,
            warnings,
            root_cause,
            verdict,
        };
        (assessment, notice)
    }

    async fn diagnose_flow(
        &self,
        confidence: f64,
        blockers: &[Blocker],
        first_blocked: Option<(String, bool)>,
        diagnosis_target: Option<(String, f64, bool)>,
    ) -> RootCause {
        let target = first_blocked
            .or_else(|| diagnosis_target.map(|(selector, _, weak)| (selector, weak)));
        let Some((selector, weak)) = target else {
            // Nothing to probe; the flow listed no elements.
            return RootCause::new(
                RootCauseKind::LowConfidence,
                "flow lists no elements to assess",
            )
            .with_remediation(vec![
                "Add the elements this flow interacts with".to_string(),
            ]);
        };

        let run_deep = confidence < self.config.deep_check_threshold || !blockers.is_empty();
        RootCauseAnalyzer::new(Arc::clone(&self.driver))
            .diagnose(&selector, confidence, weak, run_deep)
            .await
    }

    /// Push a notice to the sink, at most once per flow.
    async fn deliver_notice(&self, notice: &LowConfidenceNotice) {
        let first_time = self.notified_flows.lock().insert(notice.flow.clone());
        if !first_time {
            debug!(flow = %notice.flow, "flow already notified, skipping sink");
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(err) = sink.notify(notice).await {
            // Sink trouble must never change an assessment.
            warn!(flow = %notice.flow, error = %err, "low-confidence sink failed");
        }
    }
}

#[async_trait]
impl TestabilityAssessor for DefaultTestabilityAssessor {
    async fn assess(&self, flows: &[FlowSpec]) -> AssessmentReport {
        let mut assessments = Vec::new();
        let mut notices = Vec::new();
        let mut recommendations = Recommendations::default();
        let mut blocked_selectors = Vec::new();

        for flow in flows {
            let (assessment, notice) = self.assess_flow(flow).await;

            match assessment.verdict {
                Verdict::Testable => recommendations.ready.push(assessment.name.clone()),
                Verdict::HighRisk => recommendations.risky.push(assessment.name.clone()),
                Verdict::NonTestable => recommendations.blocked.push(assessment.name.clone()),
            }
            blocked_selectors.extend(
                assessment
                    .blockers
                    .iter()
                    .filter(|b| !b.selector.is_empty())
                    .map(|b| b.selector.clone()),
            );

            if let Some(notice) = notice {
                self.deliver_notice(&notice).await;
                notices.push(notice);
            }
            assessments.push(assessment);
        }

        blocked_selectors.sort();
        blocked_selectors.dedup();

        info!(
            flows = flows.len(),
            ready = recommendations.ready.len(),
            risky = recommendations.risky.len(),
            blocked = recommendations.blocked.len(),
            "testability assessment complete"
        );
        AssessmentReport {
            assessments,
            recommendations,
            notices,
            blocked_selectors,
        }
    }
}
