//! Two-tiered root-cause analysis
//!
//! Light probes (presence, visibility, off-screen direction) always run.
//! Deep probes (overlay hit-testing, ambiguity counting) cost extra driver
//! round-trips and run only when the caller decides the flow is bad enough
//! to warrant them. One cause is synthesized per diagnosis, by fixed
//! priority: blocking overlay > visibility issue > ambiguous selector >
//! weak identification > generic low confidence.

use std::sync::Arc;

use tracing::debug;
use webmend_driver_bridge::{BrowserDriver, PageElement};

use crate::types::{RootCause, RootCauseKind};

/// Cap on identifier suggestions for ambiguous selectors.
pub const MAX_ALTERNATIVE_IDENTIFIERS: usize = 5;

enum VisibilityFinding {
    /// Selector matches nothing at all
    Missing,

    /// Element is rendered outside the viewport in this direction
    OffScreen(&'static str),

    /// Element is in the viewport but hidden by styling
    Styled,
}

/// Diagnoses why an element drags a flow down
pub struct RootCauseAnalyzer {
    driver: Arc<dyn BrowserDriver>,
}

impl RootCauseAnalyzer {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Diagnose the problem element of a flow.
    ///
    /// `run_deep` gates the expensive probes; `weak_identification` carries
    /// the check result forward so it does not have to be recomputed.
    pub async fn diagnose(
        &self,
        selector: &str,
        confidence: f64,
        weak_identification: bool,
        run_deep: bool,
    ) -> RootCause {
        let count = match self.driver.locator_count(selector).await {
            Ok(count) => Some(count),
            Err(err) => {
                debug!(selector, error = %err, "presence probe failed");
                None
            }
        };
        let missing = count == Some(0);

        let visibility = if missing {
            Some(VisibilityFinding::Missing)
        } else {
            let visible = self.driver.is_visible(selector).await.unwrap_or(true);
            if visible {
                None
            } else {
                Some(self.classify_invisibility(selector).await)
            }
        };

        let mut overlay = None;
        let mut ambiguity = None;
        if run_deep && !missing {
            overlay = self.find_overlay(selector).await;
            if let Some(count) = count {
                if count > 1 {
                    ambiguity = Some((count, self.alternative_identifiers(selector).await));
                }
            }
        }

        self.synthesize(
            selector,
            confidence,
            weak_identification,
            visibility,
            overlay,
            ambiguity,
        )
    }

    /// Decide whether an invisible element is off-screen or styled away.
    async fn classify_invisibility(&self, selector: &str) -> VisibilityFinding {
        let bounding_box = self.driver.bounding_box(selector).await.ok().flatten();
        let viewport = self.driver.viewport_size().await.ok();
        if let (Some(bounding_box), Some((width, height))) = (bounding_box, viewport) {
            if bounding_box.y + bounding_box.height <= 0.0 {
                return VisibilityFinding::OffScreen("above");
            }
            if bounding_box.y >= height {
                return VisibilityFinding::OffScreen("below");
            }
            if bounding_box.x + bounding_box.width <= 0.0 {
                return VisibilityFinding::OffScreen("left of");
            }
            if bounding_box.x >= width {
                return VisibilityFinding::OffScreen("right of");
            }
        }
        VisibilityFinding::Styled
    }

    /// Hit-test the element's center; a different topmost element means an
    /// overlay is intercepting interactions.
    async fn find_overlay(&self, selector: &str) -> Option<PageElement> {
        let bounding_box = self.driver.bounding_box(selector).await.ok().flatten()?;
        let (x, y) = bounding_box.center();
        let top = self.driver.top_element_at(x, y).await.ok().flatten()?;

        let matches = self
            .driver
            .query_elements(selector, MAX_ALTERNATIVE_IDENTIFIERS)
            .await
            .unwrap_or_default();
        if matches.iter().any(|el| el.selector == top.selector) {
            return None;
        }
        Some(top)
    }

    /// Identifier suggestions for the elements an ambiguous selector hits.
    async fn alternative_identifiers(&self, selector: &str) -> Vec<String> {
        let matches = self
            .driver
            .query_elements(selector, MAX_ALTERNATIVE_IDENTIFIERS)
            .await
            .unwrap_or_default();
        matches.iter().filter_map(suggest_identifier).collect()
    }

    fn synthesize(
        &self,
        selector: &str,
        confidence: f64,
        weak_identification: bool,
        visibility: Option<VisibilityFinding>,
        overlay: Option<PageElement>,
        ambiguity: Option<(usize, Vec<String>)>,
    ) -> RootCause {
        if let Some(overlay) = overlay {
            return RootCause::new(
                RootCauseKind::BlockingOverlay,
                format!(
                    "`{selector}` is covered by a {} element ({})",
                    overlay.tag,
                    overlay.display_label()
                ),
            )
            .with_remediation(vec![
                "Dismiss or close the overlay covering the target".to_string(),
                "Wait for banners, modals, or toasts to clear before this step".to_string(),
                "If the overlay is the intended target, point the selector at it".to_string(),
            ]);
        }

        if let Some(finding) = visibility {
            return match finding {
                VisibilityFinding::Missing => RootCause::new(
                    RootCauseKind::VisibilityIssue,
                    format!("`{selector}` does not match any element on the current page"),
                )
                .with_remediation(vec![
                    "Update the selector to the current markup".to_string(),
                    "Confirm the flow starts from the expected page and state".to_string(),
                ]),
                VisibilityFinding::OffScreen(direction) => RootCause::new(
                    RootCauseKind::VisibilityIssue,
                    format!("`{selector}` sits off-screen {direction} the viewport"),
                )
                .with_remediation(vec![
                    "Scroll the element into view before interacting".to_string(),
                    "Review the scroll position this step starts from".to_string(),
                ]),
                VisibilityFinding::Styled => RootCause::new(
                    RootCauseKind::VisibilityIssue,
                    format!("`{selector}` is hidden by styling rather than scroll position"),
                )
                .with_remediation(vec![
                    "Reveal the element first (expand its section or open its menu)".to_string(),
                    "Wait for the UI state that makes the element visible".to_string(),
                ]),
            };
        }

        if let Some((count, alternatives)) = ambiguity {
            let mut remediation = vec![
                "Narrow the selector until it matches exactly one element".to_string(),
                "Add a unique data-testid to the intended element".to_string(),
            ];
            if !alternatives.is_empty() {
                remediation.insert(
                    0,
                    format!("Target one match directly: {}", alternatives.join(", ")),
                );
            }
            return RootCause::new(
                RootCauseKind::AmbiguousSelector,
                format!("`{selector}` matches {count} elements"),
            )
            .with_remediation(remediation)
            .with_alternatives(alternatives);
        }

        if weak_identification {
            return RootCause::new(
                RootCauseKind::WeakIdentification,
                format!("`{selector}` has no stable identifier (id, test id, aria-label, or text)"),
            )
            .with_remediation(vec![
                "Add a data-testid or id to the element".to_string(),
                "Use a visible-text or aria-label locator instead".to_string(),
            ]);
        }

        RootCause::new(
            RootCauseKind::LowConfidence,
            format!("confidence {confidence:.2} is below the acceptance threshold"),
        )
        .with_remediation(vec![
            "Review the warnings attached to this flow".to_string(),
            "Stabilize selectors and element states before running".to_string(),
        ])
    }
}

/// Best unique identifier for one element, for disambiguation suggestions.
fn suggest_identifier(element: &PageElement) -> Option<String> {
    if let Some(id) = &element.id {
        return Some(format!("#{id}"));
    }
    if let Some(test_id) = &element.test_id {
        return Some(format!("[data-testid=\"{test_id}\"]"));
    }
    if let Some(label) = &element.aria_label {
        return Some(format!("[aria-label=\"{label}\"]"));
    }
    element
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("text=\"{}\"", t.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmend_driver_bridge::{BoundingBox, ScriptedDriver};

    fn analyzer(driver: Arc<ScriptedDriver>) -> RootCauseAnalyzer {
        RootCauseAnalyzer::new(driver)
    }

    #[tokio::test]
    async fn test_overlay_outranks_everything() {
        let driver = Arc::new(
            ScriptedDriver::new()
                .with_element(
                    PageElement::new("#pay", "button")
                        .with_id("pay")
                        .with_text("Pay")
                        .with_box(BoundingBox::new(0.0, 0.0, 100.0, 40.0)),
                )
                .with_element(
                    PageElement::new(".cookie-banner", "div")
                        .with_class("cookie-banner")
                        .with_text("We use cookies")
                        .with_box(BoundingBox::new(0.0, 0.0, 400.0, 300.0)),
                ),
        );

        let cause = analyzer(driver).diagnose("#pay", 0.3, true, true).await;
        assert_eq!(cause.kind, RootCauseKind::BlockingOverlay);
        assert!(cause.issue.contains("div"));
        assert!(!cause.remediation.is_empty());
    }

    #[tokio::test]
    async fn test_missing_element_reports_absence() {
        let driver = Arc::new(ScriptedDriver::new());

        let cause = analyzer(driver).diagnose("#gone", 0.0, false, true).await;
        assert_eq!(cause.kind, RootCauseKind::VisibilityIssue);
        assert!(cause.issue.contains("does not match"));
    }

    #[tokio::test]
    async fn test_off_screen_direction_below() {
        let driver = Arc::new(
            ScriptedDriver::new().with_element(
                PageElement::new("#low", "button")
                    .with_id("low")
                    .with_visibility(false)
                    .with_box(BoundingBox::new(100.0, 2000.0, 100.0, 40.0)),
            ),
        );

        let cause = analyzer(driver).diagnose("#low", 0.0, false, false).await;
        assert_eq!(cause.kind, RootCauseKind::VisibilityIssue);
        assert!(cause.issue.contains("below"));
        assert!(cause.remediation[0].contains("Scroll"));
    }

    #[tokio::test]
    async fn test_hidden_by_styling() {
        let driver = Arc::new(
            ScriptedDriver::new().with_element(
                PageElement::new("#veiled", "button")
                    .with_id("veiled")
                    .with_visibility(false)
                    .with_box(BoundingBox::new(100.0, 100.0, 100.0, 40.0)),
            ),
        );

        let cause = analyzer(driver).diagnose("#veiled", 0.0, false, false).await;
        assert!(cause.issue.contains("styling"));
    }

    #[tokio::test]
    async fn test_ambiguous_selector_lists_alternatives() {
        let driver = Arc::new(
            ScriptedDriver::new()
                .with_element(
                    PageElement::new("#save-draft", "button")
                        .with_id("save-draft")
                        .with_box(BoundingBox::new(0.0, 0.0, 50.0, 30.0)),
                )
                .with_element(
                    PageElement::new("#save-final", "button")
                        .with_id("save-final")
                        .with_box(BoundingBox::new(100.0, 0.0, 50.0, 30.0)),
                )
                .with_element(
                    PageElement::new("button.export", "button")
                        .with_test_id("export")
                        .with_box(BoundingBox::new(200.0, 0.0, 50.0, 30.0)),
                ),
        );

        let cause = analyzer(driver).diagnose("button", 0.45, false, true).await;
        assert_eq!(cause.kind, RootCauseKind::AmbiguousSelector);
        assert!(cause.issue.contains("3 elements"));
        assert_eq!(
            cause.alternative_identifiers,
            vec![
                "#save-draft".to_string(),
                "#save-final".to_string(),
                "[data-testid=\"export\"]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_deep_probes_skipped_when_not_requested() {
        let driver = Arc::new(
            ScriptedDriver::new()
                .with_element(PageElement::new("#a", "button").with_id("a"))
                .with_element(PageElement::new("#b", "button").with_id("b")),
        );

        let cause = analyzer(Arc::clone(&driver))
            .diagnose("button", 0.6, false, false)
            .await;
        // Ambiguity needs the deep tier; light-only falls through to generic.
        assert_eq!(cause.kind, RootCauseKind::LowConfidence);
        assert_eq!(driver.calls_with_prefix("top_element_at"), 0);
    }

    #[tokio::test]
    async fn test_weak_identification_cause() {
        let driver = Arc::new(
            ScriptedDriver::new().with_element(PageElement::new("button", "button")),
        );

        let cause = analyzer(driver).diagnose("button", 0.45, true, true).await;
        assert_eq!(cause.kind, RootCauseKind::WeakIdentification);
    }
}
