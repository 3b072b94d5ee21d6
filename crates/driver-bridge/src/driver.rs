//! Browser driver trait

use async_trait::async_trait;

use crate::errors::DriverError;
use crate::types::{Action, ActionReceipt, BoundingBox, PageElement};

/// Abstraction over the browser automation driver so engines can run against
/// CDP, WebDriver, or an in-memory page in tests.
///
/// Every call carries the driver's own timeout; callers never wrap these in
/// an additional wall clock. Selector arguments use the driver's locator
/// grammar and are passed through untouched.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Execute one action against the live page.
    async fn execute(&self, action: &Action) -> Result<ActionReceipt, DriverError>;

    /// Count how many elements the selector resolves to right now.
    async fn locator_count(&self, selector: &str) -> Result<usize, DriverError>;

    /// Whether the first match for the selector is currently visible.
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    /// Whether the first match for the selector is currently enabled.
    async fn is_enabled(&self, selector: &str) -> Result<bool, DriverError>;

    /// Layout box of the first match, `None` when not rendered.
    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, DriverError>;

    /// Current viewport size as (width, height) in CSS pixels.
    async fn viewport_size(&self) -> Result<(f64, f64), DriverError>;

    /// Topmost element at the given page coordinate.
    ///
    /// Serves the overlay scan during root-cause analysis. Drivers without
    /// hit-testing support may leave the default, which reports nothing.
    async fn top_element_at(&self, x: f64, y: f64) -> Result<Option<PageElement>, DriverError> {
        let _ = (x, y);
        Ok(None)
    }

    /// Snapshot the elements matching the selector, up to `limit`.
    async fn query_elements(
        &self,
        selector: &str,
        limit: usize,
    ) -> Result<Vec<PageElement>, DriverError>;

    /// Snapshot the interactive elements of the current page, up to `limit`.
    async fn snapshot_elements(&self, limit: usize) -> Result<Vec<PageElement>, DriverError>;

    /// Capture a screenshot of the current viewport.
    ///
    /// Only the vision healing strategy needs this; drivers without capture
    /// support may leave the default, which reports the capability missing.
    async fn capture_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Protocol(
            "screenshot capture not supported by this driver".to_string(),
        ))
    }

    /// Serialize the current DOM to a string.
    async fn capture_dom(&self) -> Result<String, DriverError>;

    /// URL of the current page.
    async fn current_url(&self) -> Result<String, DriverError>;
}
