//! Per-element testability checks
//!
//! Checks run in a fixed order against the live page; each finding either
//! blocks the flow or subtracts a fixed penalty from the element's
//! confidence. A selector that resolves to nothing short-circuits the
//! remaining checks for that element.

use std::sync::Arc;

use tracing::{debug, warn};
use webmend_driver_bridge::{BrowserDriver, PageElement};

use crate::types::{Blocker, BlockerKind, TestabilityCheck, Warning, WarningKind};

/// Penalty for a disabled element.
pub const DISABLED_PENALTY: f64 = 0.3;

/// Penalty for an interactive area below the minimum size.
pub const TOO_SMALL_PENALTY: f64 = 0.1;

/// Penalty for an element with no stable identifier.
pub const WEAK_IDENTIFICATION_PENALTY: f64 = 0.2;

/// Penalty for class names that suggest transient content.
pub const DYNAMIC_CONTENT_PENALTY: f64 = 0.15;

/// Penalty for an email input without validation attributes.
pub const MISSING_VALIDATION_PENALTY: f64 = 0.1;

/// Class tokens that mark content as still loading or placeholder.
pub const DYNAMIC_CLASS_MARKERS: &[&str] =
    &["loading", "skeleton", "spinner", "shimmer", "placeholder"];

/// Runs the check sequence for single elements
pub struct ElementChecker {
    driver: Arc<dyn BrowserDriver>,
    min_interactive_size_px: f64,
}

impl ElementChecker {
    pub fn new(driver: Arc<dyn BrowserDriver>, min_interactive_size_px: f64) -> Self {
        Self {
            driver,
            min_interactive_size_px,
        }
    }

    /// Check one proposed element against the live page.
    pub async fn check_element(&self, element: &PageElement) -> TestabilityCheck {
        let selector = element.selector.as_str();
        let mut check = TestabilityCheck::default();

        // Resolution first; nothing else is meaningful without a match.
        let count = match self.driver.locator_count(selector).await {
            Ok(count) => count,
            Err(err) => {
                warn!(selector, error = %err, "selector could not be resolved");
                check.record_blocker(Blocker::new(
                    BlockerKind::NoMatch,
                    selector,
                    format!("selector could not be resolved: {err}"),
                ));
                return check;
            }
        };
        if count == 0 {
            check.record_blocker(Blocker::new(
                BlockerKind::NoMatch,
                selector,
                "selector resolves to no element on the current page",
            ));
            return check;
        }

        // Remaining checks read the live element; the proposed snapshot is
        // only a fallback when the query fails.
        let live = self
            .driver
            .query_elements(selector, 1)
            .await
            .ok()
            .and_then(|elements| elements.into_iter().next());
        let live = live.as_ref().unwrap_or(element);

        if !live.visible {
            check.record_blocker(Blocker::new(
                BlockerKind::NotVisible,
                selector,
                "element is present but not visible",
            ));
        }
        if !live.enabled {
            check.record_warning(
                Warning::new(WarningKind::Disabled, selector, "element is disabled"),
                DISABLED_PENALTY,
            );
        }
        if let Some(bounding_box) = live.bounding_box {
            if bounding_box.min_side() < self.min_interactive_size_px {
                check.record_warning(
                    Warning::new(
                        WarningKind::TooSmall,
                        selector,
                        format!(
                            "interactive area {:.0}x{:.0}px is below the {:.0}px minimum",
                            bounding_box.width, bounding_box.height, self.min_interactive_size_px
                        ),
                    ),
                    TOO_SMALL_PENALTY,
                );
            }
        }
        if !live.has_stable_identity() {
            check.record_warning(
                Warning::new(
                    WarningKind::WeakIdentification,
                    selector,
                    "element has no id, test id, aria-label, or text",
                ),
                WEAK_IDENTIFICATION_PENALTY,
            );
        }
        if let Some(marker) = dynamic_class_marker(live.class_name.as_deref()) {
            check.record_warning(
                Warning::new(
                    WarningKind::DynamicContent,
                    selector,
                    format!("class \"{marker}\" suggests the content is still loading"),
                ),
                DYNAMIC_CONTENT_PENALTY,
            );
        }
        if live.input_type.as_deref() == Some("email") && !live.required && live.pattern.is_none() {
            check.record_warning(
                Warning::new(
                    WarningKind::MissingValidation,
                    selector,
                    "email input carries no required or pattern validation",
                ),
                MISSING_VALIDATION_PENALTY,
            );
        }

        debug!(
            selector,
            blockers = check.blockers.len(),
            warnings = check.warnings.len(),
            confidence = check.element_confidence(),
            "element checked"
        );
        check
    }
}

/// First class token containing a dynamic-content marker, if any.
fn dynamic_class_marker(class_name: Option<&str>) -> Option<String> {
    let class_name = class_name?;
    for token in class_name.split_whitespace() {
        let lowered = token.to_ascii_lowercase();
        if DYNAMIC_CLASS_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return Some(token.to_string());
        }
    }
    None
}
