//! Data types crossing the driver boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interaction kind enumeration
///
/// Covers the action vocabulary the engine can execute, heal, and
/// substitute. Element-targeted kinds carry a selector; page-level kinds
/// (navigate, wait) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Click or tap an element
    Click,

    /// Type text into an input or editable element
    TypeText,

    /// Pick an option from a select/listbox
    Select,

    /// Load a URL in the current page
    Navigate,

    /// Scroll an element into view (or the page, when no selector is set)
    Scroll,

    /// Pause until a driver-side condition settles
    Wait,

    /// Assert that an element is present and visible
    Assert,
}

impl ActionKind {
    /// Get kind name as string
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::TypeText => "type_text",
            ActionKind::Select => "select",
            ActionKind::Navigate => "navigate",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
            ActionKind::Assert => "assert",
        }
    }

    /// Whether this kind resolves a page element before acting
    pub fn targets_element(&self) -> bool {
        !matches!(self, ActionKind::Navigate | ActionKind::Wait)
    }

    /// Whether an element of the given tag/input type can receive this kind
    ///
    /// Used when ranking substitute elements: a `type_text` action should
    /// never be redirected to a plain link, a click never to a bare label.
    pub fn accepts_element(&self, tag: &str, input_type: Option<&str>) -> bool {
        let tag = tag.to_ascii_lowercase();
        match self {
            ActionKind::Click | ActionKind::Assert => matches!(
                tag.as_str(),
                "button" | "a" | "input" | "select" | "textarea" | "summary" | "option" | "label"
            ),
            ActionKind::TypeText => {
                tag == "textarea"
                    || (tag == "input"
                        && !matches!(
                            input_type.unwrap_or("text"),
                            "checkbox" | "radio" | "button" | "submit" | "reset" | "file"
                        ))
            }
            ActionKind::Select => tag == "select",
            ActionKind::Scroll => true,
            ActionKind::Navigate | ActionKind::Wait => false,
        }
    }
}

/// One interaction request submitted to the engine
///
/// An Action is immutable once issued for a given attempt; when an
/// alternative strategy is adopted mid-retry, a new Action value replaces
/// it rather than mutating the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// What to do
    pub kind: ActionKind,

    /// Human label for the target ("Submit button", "Email field")
    ///
    /// Drives the text healing rung and the reasoning prompts; never
    /// interpreted as a selector.
    #[serde(default)]
    pub target_hint: String,

    /// Selector for the target element (element-targeted kinds)
    #[serde(default)]
    pub selector: Option<String>,

    /// Payload: text to type, option to select, URL to open
    #[serde(default)]
    pub value: Option<String>,

    /// Planner confidence in this action, when known (0.0-1.0)
    #[serde(default)]
    pub confidence: Option<f64>,

    /// Free-form intent description for logs and prompts
    #[serde(default)]
    pub description: String,
}

impl Action {
    /// Create a new action with the given kind and target hint
    pub fn new(kind: ActionKind, target_hint: impl Into<String>) -> Self {
        let target_hint = target_hint.into();
        Self {
            kind,
            description: target_hint.clone(),
            target_hint,
            selector: None,
            value: None,
            confidence: None,
        }
    }

    /// Set the selector
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Set the value payload
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the planner confidence
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set the intent description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Return a copy of this action pointing at a different selector
    pub fn retargeted(&self, selector: impl Into<String>) -> Self {
        let mut action = self.clone();
        action.selector = Some(selector.into());
        action
    }
}

/// Axis-aligned element geometry in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Euclidean distance between the centers of two boxes
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Shorter of width and height
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Whether the point lies inside the box (edges inclusive)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Read-only snapshot of one element as the driver saw it
///
/// Explicit optional fields only; consumers never probe for ad-hoc
/// properties that may or may not be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageElement {
    /// Selector that resolves to this element
    pub selector: String,

    /// Layout geometry, when the element was rendered
    pub bounding_box: Option<BoundingBox>,

    /// Trimmed visible text content
    pub text: Option<String>,

    /// aria-label attribute
    pub aria_label: Option<String>,

    /// id attribute
    pub id: Option<String>,

    /// data-testid attribute
    pub test_id: Option<String>,

    /// Lowercase tag name
    pub tag: String,

    /// class attribute as written
    pub class_name: Option<String>,

    /// type attribute for inputs
    pub input_type: Option<String>,

    /// Whether the required validation attribute is set
    pub required: bool,

    /// pattern validation attribute for inputs
    pub pattern: Option<String>,

    /// Whether the element was visible at snapshot time
    pub visible: bool,

    /// Whether the element was enabled at snapshot time
    pub enabled: bool,
}

impl PageElement {
    /// Create a new element snapshot with the given selector and tag
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            bounding_box: None,
            text: None,
            aria_label: None,
            id: None,
            test_id: None,
            tag: tag.into().to_ascii_lowercase(),
            class_name: None,
            input_type: None,
            required: false,
            pattern: None,
            visible: true,
            enabled: true,
        }
    }

    pub fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the element carries any stable identifying hook
    ///
    /// id, test id, aria-label, or visible text all qualify; an element with
    /// none of them can only be addressed positionally.
    pub fn has_stable_identity(&self) -> bool {
        self.id.is_some()
            || self.test_id.is_some()
            || self.aria_label.is_some()
            || self
                .text
                .as_deref()
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false)
    }

    /// Short label for logs: text, aria-label, id, or the selector
    pub fn display_label(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.aria_label.as_deref())
            .or(self.id.as_deref())
            .unwrap_or(&self.selector)
    }
}

/// Receipt for a successfully executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReceipt {
    /// When the driver started the action
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the driver finished the action
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// URL after the action, when it changed
    pub url_after: Option<String>,
}

impl ActionReceipt {
    /// Create a receipt for an action that just finished
    pub fn completed(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            url_after: None,
        }
    }

    /// Record the post-action URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_after = Some(url.into());
        self
    }
}
