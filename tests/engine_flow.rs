//! End-to-end paths through the engine facade: assessment gating,
//! selector healing, memory persistence, and the hallucination guard.

use std::sync::Arc;

use tempfile::TempDir;
use webmend::prelude::*;
use webmend::{Engine, EngineConfig};

fn checkout_page() -> Arc<ScriptedDriver> {
    let driver = Arc::new(ScriptedDriver::new());
    driver.add_element(
        PageElement::new("#submit-btn", "button")
            .with_id("submit-btn")
            .with_text("Submit")
            .with_box(BoundingBox::new(10.0, 10.0, 120.0, 44.0)),
    );
    driver
}

fn engine_for(driver: &Arc<ScriptedDriver>) -> Engine {
    Engine::builder()
        .with_driver(Arc::clone(driver) as Arc<dyn BrowserDriver>)
        .with_project(ProjectId::from("checkout"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_stale_selector_heals_on_second_attempt() {
    let driver = checkout_page();
    let engine = engine_for(&driver);
    let run = engine.new_run();

    let action = Action::new(ActionKind::Click, "Submit").with_selector("#submit-1234");
    let result = run.submit(Submission::new(action)).await;

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    let healing = result.healing.expect("healing record");
    assert_eq!(healing.original_selector, "#submit-1234");
    assert_eq!(healing.healed_selector, "text=\"Submit\"");
    assert_eq!(healing.strategy, HealStrategy::Text);

    let events = run.heal_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, "healed");

    let stats = engine.memory_stats();
    assert_eq!(stats.miss_lookups, 1);
    assert_eq!(stats.upserts, 1);
}

#[tokio::test]
async fn test_remembered_heal_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.healing.memory_path = Some(dir.path().join("heals.json"));

    {
        let driver = checkout_page();
        let engine = Engine::builder()
            .with_driver(Arc::clone(&driver) as Arc<dyn BrowserDriver>)
            .with_project(ProjectId::from("checkout"))
            .with_config(config.clone())
            .build()
            .unwrap();
        let run = engine.new_run();
        let action = Action::new(ActionKind::Click, "Submit").with_selector("#submit-1234");
        let result = run.submit(Submission::new(action)).await;
        assert!(result.success);
        engine.persist_memory().unwrap();
    }

    let driver = checkout_page();
    let engine = Engine::builder()
        .with_driver(Arc::clone(&driver) as Arc<dyn BrowserDriver>)
        .with_project(ProjectId::from("checkout"))
        .with_config(config)
        .build()
        .unwrap();
    assert_eq!(engine.memory_stats().current_entries, 1);

    let run = engine.new_run();
    let action = Action::new(ActionKind::Click, "Submit").with_selector("#submit-1234");
    let result = run.submit(Submission::new(action)).await;

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    let healing = result.healing.expect("replayed heal");
    assert_eq!(healing.healed_selector, "text=\"Submit\"");
    assert!((healing.confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(engine.memory_stats().hit_lookups, 1);
}

#[tokio::test]
async fn test_assessment_blocks_run_for_broken_flows() {
    let driver = Arc::new(ScriptedDriver::new());
    driver.add_element(
        PageElement::new("#go", "button")
            .with_id("go")
            .with_text("Go")
            .with_box(BoundingBox::new(0.0, 0.0, 120.0, 44.0)),
    );
    driver.add_element(
        PageElement::new("#checkout", "button")
            .with_id("checkout")
            .with_text("Checkout")
            .with_box(BoundingBox::new(0.0, 60.0, 120.0, 44.0))
            .with_visibility(false),
    );
    let engine = engine_for(&driver);

    let flows = vec![
        FlowSpec::new("search").with_element(PageElement::new("#go", "button")),
        FlowSpec::new("checkout").with_element(PageElement::new("#checkout", "button")),
    ];
    let report = engine.assess(&flows).await;

    assert!(report.is_blocked("#checkout"));
    assert!(!report.is_blocked("#go"));
    assert!(report.recommendations.ready.contains(&"search".to_string()));
    assert!(report
        .recommendations
        .blocked
        .contains(&"checkout".to_string()));

    let run = engine.new_run_gated(&report);
    let refused = run
        .submit(Submission::new(
            Action::new(ActionKind::Click, "Checkout").with_selector("#checkout"),
        ))
        .await;
    assert!(!refused.success);
    assert_eq!(refused.attempts, 0);

    let allowed = run
        .submit(Submission::new(
            Action::new(ActionKind::Click, "Go").with_selector("#go"),
        ))
        .await;
    assert!(allowed.success);
    assert_eq!(allowed.attempts, 1);
}

#[tokio::test]
async fn test_empty_flow_trips_guard_and_notifies_sink() {
    let driver = Arc::new(ScriptedDriver::new());
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::builder()
        .with_driver(Arc::clone(&driver) as Arc<dyn BrowserDriver>)
        .with_notice_sink(Arc::clone(&sink) as Arc<dyn LowConfidenceSink>)
        .build()
        .unwrap();

    let flows = vec![FlowSpec::new("ghost")];
    let report = engine.assess(&flows).await;

    assert_eq!(sink.count(), 1);
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].flow, "ghost");
    assert!(report.notices[0].confidence < 0.4);
    assert!(report
        .recommendations
        .blocked
        .contains(&"ghost".to_string()));
    // The guard blocker names no selector, so nothing is gated.
    assert!(report.blocked_selectors.is_empty());
}
