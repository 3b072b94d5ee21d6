//! Vision-assisted spatial strategy
//!
//! The last ladder rung. Captures a fresh screenshot, asks the reasoning
//! service to localize interactive elements, and ranks them by gravity
//! toward the original element's last known position. Requires both a
//! reasoning service with vision support and a remembered bounding box;
//! without either it yields nothing and the ladder ends.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use webmend_driver_bridge::{BoundingBox, BrowserDriver, PageElement};
use webmend_reasoning_bridge::{format_localization_prompt, ReasoningError, SharedReasoning};

use crate::errors::HealError;
use crate::strategies::HealTactic;
use crate::types::{HealCandidate, HealRequest, HealStrategy};

/// How far from the last known center a candidate may sit, in pixels.
pub const DEFAULT_VISION_RADIUS_PX: f64 = 50.0;

/// Minimum comfortable tap target side, in pixels.
pub const DEFAULT_MIN_TAP_SIZE_PX: f64 = 20.0;

const TYPE_COMPATIBLE_BONUS: f64 = 1.2;
const TYPE_MISMATCH_FACTOR: f64 = 0.7;
const SIZE_COMFORTABLE_BONUS: f64 = 1.1;
const SIZE_CRAMPED_FACTOR: f64 = 0.8;

/// Screenshot localization strategy
pub struct VisionTactic {
    driver: Arc<dyn BrowserDriver>,
    reasoner: SharedReasoning,
    radius_px: f64,
    min_tap_size_px: f64,
}

impl VisionTactic {
    pub fn new(driver: Arc<dyn BrowserDriver>, reasoner: SharedReasoning) -> Self {
        Self {
            driver,
            reasoner,
            radius_px: DEFAULT_VISION_RADIUS_PX,
            min_tap_size_px: DEFAULT_MIN_TAP_SIZE_PX,
        }
    }

    pub fn with_radius(mut self, radius_px: f64) -> Self {
        self.radius_px = radius_px;
        self
    }

    pub fn with_min_tap_size(mut self, min_tap_size_px: f64) -> Self {
        self.min_tap_size_px = min_tap_size_px;
        self
    }

    /// Score localized elements by gravity toward the anchor box.
    ///
    /// `score = (1 / (distance + 1)) × type bonus × size bonus`, with
    /// candidates outside the radius discarded outright.
    fn rank_by_gravity(
        &self,
        elements: Vec<PageElement>,
        anchor: &BoundingBox,
        request: &HealRequest,
    ) -> Vec<HealCandidate> {
        let mut candidates = Vec::new();
        for element in elements {
            let Some(bounding_box) = element.bounding_box else {
                continue;
            };
            let distance = anchor.center_distance(&bounding_box);
            if distance > self.radius_px {
                debug!(
                    selector = %element.selector,
                    distance_px = distance,
                    "vision candidate outside gravity radius"
                );
                continue;
            }
            let type_bonus = if request
                .action
                .kind
                .accepts_element(&element.tag, element.input_type.as_deref())
            {
                TYPE_COMPATIBLE_BONUS
            } else {
                TYPE_MISMATCH_FACTOR
            };
            let size_bonus = if bounding_box.min_side() >= self.min_tap_size_px {
                SIZE_COMFORTABLE_BONUS
            } else {
                SIZE_CRAMPED_FACTOR
            };
            let score = (1.0 / (distance + 1.0)) * type_bonus * size_bonus;
            candidates.push(HealCandidate::new(
                element.selector,
                score.min(1.0),
                format!("visual match {distance:.0}px from last known position"),
            ));
        }
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}

#[async_trait]
impl HealTactic for VisionTactic {
    fn strategy(&self) -> HealStrategy {
        HealStrategy::Vision
    }

    async fn candidates(&self, request: &HealRequest) -> Result<Vec<HealCandidate>, HealError> {
        let Some(anchor) = request.last_known_box else {
            debug!("vision strategy skipped, no last known bounding box");
            return Ok(Vec::new());
        };
        let Some(original) = request.original_selector() else {
            return Ok(Vec::new());
        };

        let screenshot = match self.driver.capture_screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "vision strategy skipped, screenshot unavailable");
                return Ok(Vec::new());
            }
        };
        let dom = self.driver.capture_dom().await.unwrap_or_default();

        let hint = {
            let direct = request.action.target_hint.trim();
            if direct.is_empty() {
                request.action.description.as_str()
            } else {
                direct
            }
        };
        let prompt = format_localization_prompt(hint, original);

        let localized = match self
            .reasoner
            .localize_elements(&screenshot, &dom, &prompt)
            .await
        {
            Ok(elements) => elements,
            Err(ReasoningError::Unavailable(reason)) => {
                debug!(reason, "reasoning service has no vision support");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(error = %err, "vision localization failed");
                return Ok(Vec::new());
            }
        };
        debug!(count = localized.len(), "vision localization returned elements");

        Ok(self.rank_by_gravity(localized, &anchor, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmend_core_types::ProjectId;
    use webmend_driver_bridge::{Action, ActionKind, ScriptedDriver};
    use webmend_reasoning_bridge::MockReasoningService;

    fn request_with_anchor() -> HealRequest {
        HealRequest::new(
            Action::new(ActionKind::Click, "Pay now").with_selector("#pay-1234"),
            ProjectId::from("proj"),
        )
        .with_last_known_box(BoundingBox::new(100.0, 100.0, 80.0, 30.0))
    }

    #[tokio::test]
    async fn test_skips_without_anchor_box() {
        let driver = Arc::new(ScriptedDriver::new().with_screenshot(vec![1, 2, 3]));
        let reasoner = Arc::new(MockReasoningService::new());
        let tactic = VisionTactic::new(driver, reasoner.clone());

        let request = HealRequest::new(
            Action::new(ActionKind::Click, "Pay now").with_selector("#pay-1234"),
            ProjectId::from("proj"),
        );
        let candidates = tactic.candidates(&request).await.unwrap();
        assert!(candidates.is_empty());
        assert_eq!(reasoner.localize_calls(), 0);
    }

    #[tokio::test]
    async fn test_skips_when_screenshot_unsupported() {
        let driver = Arc::new(ScriptedDriver::new());
        let reasoner = Arc::new(MockReasoningService::new());
        let tactic = VisionTactic::new(driver, reasoner.clone());

        let candidates = tactic.candidates(&request_with_anchor()).await.unwrap();
        assert!(candidates.is_empty());
        assert_eq!(reasoner.localize_calls(), 0);
    }

    #[tokio::test]
    async fn test_gravity_ranking() {
        let driver = Arc::new(ScriptedDriver::new().with_screenshot(vec![0u8; 16]));
        let reasoner = Arc::new(MockReasoningService::new());
        // Anchor center sits at (140, 115).
        reasoner.push_localized(vec![
            PageElement::new("#near", "button")
                .with_box(BoundingBox::new(105.0, 105.0, 80.0, 30.0)),
            PageElement::new("#far", "button")
                .with_box(BoundingBox::new(600.0, 600.0, 80.0, 30.0)),
            PageElement::new("#tiny", "button")
                .with_box(BoundingBox::new(150.0, 125.0, 12.0, 12.0)),
            PageElement::new("#boxless", "button"),
        ]);
        let tactic = VisionTactic::new(driver, reasoner);

        let candidates = tactic.candidates(&request_with_anchor()).await.unwrap();
        let selectors: Vec<&str> = candidates.iter().map(|c| c.selector.as_str()).collect();
        assert!(!selectors.contains(&"#far"));
        assert!(!selectors.contains(&"#boxless"));
        assert_eq!(selectors[0], "#near");
        assert!(candidates[0].confidence > candidates[1].confidence);
    }

    #[tokio::test]
    async fn test_type_mismatch_ranks_below_compatible() {
        let driver = Arc::new(ScriptedDriver::new().with_screenshot(vec![0u8; 16]));
        let reasoner = Arc::new(MockReasoningService::new());
        // Same geometry, different tags; only the button can receive a click.
        reasoner.push_localized(vec![
            PageElement::new("div.decoy", "div")
                .with_box(BoundingBox::new(110.0, 102.0, 60.0, 26.0)),
            PageElement::new("#button", "button")
                .with_box(BoundingBox::new(110.0, 102.0, 60.0, 26.0)),
        ]);
        let tactic = VisionTactic::new(driver, reasoner);

        let candidates = tactic.candidates(&request_with_anchor()).await.unwrap();
        assert_eq!(candidates[0].selector, "#button");
        assert_eq!(candidates[1].selector, "div.decoy");
    }
}
