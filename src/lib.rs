//! webmend library
//!
//! Resilience and testability engine for autonomous browser-based
//! functional testing. The [`Engine`] facade wires the workspace crates
//! together; the crates themselves stay usable on their own.

pub mod config;
pub mod engine;

// Re-export commonly used types for external use
pub use config::{load_config, ConfigError, EngineConfig, HealingSection};
pub use engine::{Engine, EngineBuilder, EngineRun};

/// Everything a caller typically needs in one import.
pub mod prelude {
    pub use webmend_core_types::{ActionContext, ActionId, ProjectId, RunId};
    pub use webmend_driver_bridge::{
        Action, ActionKind, ActionReceipt, BoundingBox, BrowserDriver, DriverError, PageElement,
        ScriptedDriver,
    };
    pub use webmend_flow_testability::{
        AssessmentReport, AssessorConfig, DefaultTestabilityAssessor, FlowSpec, LowConfidenceSink,
        RecordingSink, TestabilityAssessor, Verdict,
    };
    pub use webmend_healing_memory::{
        HealingMemory, HealingMemoryStore, MemoryStatsSnapshot, SharedHealingMemory,
    };
    pub use webmend_reasoning_bridge::{MockReasoningService, ReasoningService, SharedReasoning};
    pub use webmend_retry_engine::{
        AlternativeProposer, RetryError, RetryOrchestrator, RetryPolicy, RetryResult, Submission,
    };
    pub use webmend_selector_heal::{
        DefaultSelectorHealer, HealOutcome, HealStrategy, SelectorHealer, SelfHealingRecord,
    };

    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineRun};
}
