//! Assessment data model

use serde::{Deserialize, Serialize};
use webmend_driver_bridge::PageElement;

/// One named interaction flow to assess
///
/// Elements are the caller's proposed snapshots (typically planner output);
/// the assessor verifies each one against the live page by its selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    pub elements: Vec<PageElement>,
}

impl FlowSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: PageElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// Issue severe enough to make a flow untestable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerKind {
    /// Selector resolves to no element
    NoMatch,

    /// Element exists but is not visible
    NotVisible,

    /// Synthesized when the hallucination guard trips
    LowConfidence,
}

impl BlockerKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockerKind::NoMatch => "no_match",
            BlockerKind::NotVisible => "not_visible",
            BlockerKind::LowConfidence => "low_confidence",
        }
    }
}

/// A blocking issue found during assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub kind: BlockerKind,
    pub selector: String,
    pub detail: String,
}

impl Blocker {
    pub fn new(kind: BlockerKind, selector: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            detail: detail.into(),
        }
    }
}

/// Issue that lowers confidence without blocking outright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Element is disabled
    Disabled,

    /// Interactive area below the minimum comfortable size
    TooSmall,

    /// No id, test id, aria-label, or text to identify the element
    WeakIdentification,

    /// Class names suggest transient loading content
    DynamicContent,

    /// Email input without basic validation attributes
    MissingValidation,
}

/// A confidence-lowering issue found during assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub selector: String,
    pub detail: String,
}

impl Warning {
    pub fn new(kind: WarningKind, selector: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            detail: detail.into(),
        }
    }
}

/// Per-element check result, consumed immediately into a flow assessment
#[derive(Debug, Clone, Default)]
pub struct TestabilityCheck {
    pub has_blocker: bool,
    pub has_warning: bool,
    pub confidence_penalty: f64,
    pub issues: Vec<String>,
    pub blockers: Vec<Blocker>,
    pub warnings: Vec<Warning>,
}

impl TestabilityCheck {
    pub fn record_blocker(&mut self, blocker: Blocker) {
        self.has_blocker = true;
        self.issues.push(blocker.detail.clone());
        self.blockers.push(blocker);
    }

    pub fn record_warning(&mut self, warning: Warning, penalty: f64) {
        self.has_warning = true;
        self.confidence_penalty += penalty;
        self.issues.push(warning.detail.clone());
        self.warnings.push(warning);
    }

    /// Post-penalty confidence contributed by this element.
    pub fn element_confidence(&self) -> f64 {
        if self.has_blocker {
            0.0
        } else {
            (1.0 - self.confidence_penalty).clamp(0.0, 1.0)
        }
    }
}

/// Why a flow scored the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCauseKind {
    /// Another element sits on top of the target
    BlockingOverlay,

    /// Target is off-screen or hidden by styling
    VisibilityIssue,

    /// Selector matches more than one element
    AmbiguousSelector,

    /// Target carries no stable identifier
    WeakIdentification,

    /// Nothing specific found; confidence is simply low
    LowConfidence,
}

/// Synthesized diagnosis for a problem flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub kind: RootCauseKind,

    /// Human-readable description of the specific problem
    pub issue: String,

    /// Actionable remediation steps, most effective first
    pub remediation: Vec<String>,

    /// Up to five alternative identifiers for ambiguous matches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_identifiers: Vec<String>,
}

impl RootCause {
    pub fn new(kind: RootCauseKind, issue: impl Into<String>) -> Self {
        Self {
            kind,
            issue: issue.into(),
            remediation: Vec::new(),
            alternative_identifiers: Vec::new(),
        }
    }

    pub fn with_remediation(mut self, steps: Vec<String>) -> Self {
        self.remediation = steps;
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternative_identifiers = alternatives;
        self
    }
}

/// Terminal classification of an assessed flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Testable with confidence at or above the testable threshold
    Testable,

    /// Testable but below the testable threshold
    HighRisk,

    /// Blocked or failed the hallucination guard
    NonTestable,
}

impl Verdict {
    pub fn name(&self) -> &'static str {
        match self {
            Verdict::Testable => "testable",
            Verdict::HighRisk => "high_risk",
            Verdict::NonTestable => "non_testable",
        }
    }
}

/// Full diagnosis of one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowAssessment {
    pub name: String,

    /// Selectors of the elements this flow touches, in order
    pub element_refs: Vec<String>,

    /// Running average of post-penalty element confidences, clamped to [0, 1]
    pub confidence: f64,

    pub can_test: bool,
    pub blockers: Vec<Blocker>,
    pub warnings: Vec<Warning>,

    /// Present when the flow needed diagnosis
    pub root_cause: Option<RootCause>,

    pub verdict: Verdict,
}

impl FlowAssessment {
    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }
}

/// Payload pushed to the low-confidence notification sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowConfidenceNotice {
    pub flow: String,
    pub confidence: f64,
    pub root_cause: Option<RootCause>,
}

/// Flow names bucketed by verdict
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recommendations {
    /// Run these now
    pub ready: Vec<String>,

    /// Runnable but expect flakiness
    pub risky: Vec<String>,

    /// Fix before running
    pub blocked: Vec<String>,
}

/// Everything one assessment pass produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub assessments: Vec<FlowAssessment>,
    pub recommendations: Recommendations,

    /// Low-confidence notices, one per guarded flow
    pub notices: Vec<LowConfidenceNotice>,

    /// Selectors with blockers; the orchestrator refuses actions against these
    pub blocked_selectors: Vec<String>,
}

impl AssessmentReport {
    pub fn is_blocked(&self, selector: &str) -> bool {
        self.blocked_selectors.iter().any(|s| s == selector)
    }

    pub fn assessment(&self, flow_name: &str) -> Option<&FlowAssessment> {
        self.assessments.iter().find(|a| a.name == flow_name)
    }
}
