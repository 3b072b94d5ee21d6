//! Deterministic in-memory driver for tests and offline development
//!
//! `ScriptedDriver` serves fixture elements through a small locator grammar
//! (tag, `#id`, `.class`, `[attr="v"]` with `^=`/`*=` prefixes, and the
//! `text="..."` form) and lets tests script per-selector failure sequences
//! to exercise retry, healing, and alternative paths without a browser.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::driver::BrowserDriver;
use crate::errors::DriverError;
use crate::types::{Action, ActionKind, ActionReceipt, BoundingBox, PageElement};

const DEFAULT_URL: &str = "http://localhost/";
const DEFAULT_VIEWPORT: (f64, f64) = (1280.0, 720.0);

#[derive(Default)]
struct ScriptedState {
    url: String,
    viewport: (f64, f64),
    elements: Vec<PageElement>,
    /// Per-selector queues of scripted execute outcomes, consumed in order.
    outcomes: HashMap<String, VecDeque<Result<(), DriverError>>>,
    /// Every trait call in order, as "operation argument" strings.
    journal: Vec<String>,
    dom: String,
    screenshot: Option<Vec<u8>>,
}

/// In-memory [`BrowserDriver`] with scriptable outcomes and a call journal.
pub struct ScriptedDriver {
    state: Mutex<ScriptedState>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                url: DEFAULT_URL.to_string(),
                viewport: DEFAULT_VIEWPORT,
                ..Default::default()
            }),
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state.lock().url = url.into();
        self
    }

    pub fn with_viewport(self, width: f64, height: f64) -> Self {
        self.state.lock().viewport = (width, height);
        self
    }

    pub fn with_element(self, element: PageElement) -> Self {
        self.state.lock().elements.push(element);
        self
    }

    pub fn with_dom(self, dom: impl Into<String>) -> Self {
        self.state.lock().dom = dom.into();
        self
    }

    pub fn with_screenshot(self, bytes: Vec<u8>) -> Self {
        self.state.lock().screenshot = Some(bytes);
        self
    }

    /// Add a fixture element after construction.
    ///
    /// Later elements sit above earlier ones for hit-testing.
    pub fn add_element(&self, element: PageElement) {
        self.state.lock().elements.push(element);
    }

    /// Drop every fixture the selector matches. Returns how many were removed.
    pub fn remove_elements(&self, selector: &str) -> usize {
        let mut state = self.state.lock();
        let before = state.elements.len();
        state.elements.retain(|el| !selector_matches(selector, el));
        before - state.elements.len()
    }

    /// Queue an outcome for the next `execute` against this exact selector.
    ///
    /// Queued outcomes are consumed first-in first-out; once drained, the
    /// driver falls back to fixture-based behavior.
    pub fn script_outcome(&self, selector: impl Into<String>, outcome: Result<(), DriverError>) {
        self.state
            .lock()
            .outcomes
            .entry(selector.into())
            .or_default()
            .push_back(outcome);
    }

    /// Queue a failure for the next `execute` against this exact selector.
    pub fn fail_next(&self, selector: impl Into<String>, error: DriverError) {
        self.script_outcome(selector, Err(error));
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    /// Full call journal, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// How many journal entries start with the given prefix.
    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    /// How many actions were executed.
    pub fn execute_count(&self) -> usize {
        self.calls_with_prefix("execute")
    }

    fn record(&self, entry: String) {
        self.state.lock().journal.push(entry);
    }

    fn matching_elements(&self, selector: &str) -> Vec<PageElement> {
        self.state
            .lock()
            .elements
            .iter()
            .filter(|el| selector_matches(selector, el))
            .cloned()
            .collect()
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn execute(&self, action: &Action) -> Result<ActionReceipt, DriverError> {
        let started_at = Utc::now();
        self.record(format!(
            "execute {} {}",
            action.kind.name(),
            action.selector.as_deref().unwrap_or("-")
        ));

        match action.kind {
            ActionKind::Navigate => {
                let url = action.value.clone().ok_or_else(|| {
                    DriverError::Protocol("navigate action carries no URL".to_string())
                })?;
                self.state.lock().url = url.clone();
                return Ok(ActionReceipt::completed(started_at, 1).with_url(url));
            }
            ActionKind::Wait => {
                return Ok(ActionReceipt::completed(started_at, 1));
            }
            _ => {}
        }

        let selector = action
            .selector
            .as_deref()
            .ok_or_else(|| DriverError::SelectorInvalid("action has no selector".to_string()))?;

        // Scripted outcomes win over fixture state.
        let scripted = {
            let mut state = self.state.lock();
            state
                .outcomes
                .get_mut(selector)
                .and_then(|queue| queue.pop_front())
        };
        if let Some(outcome) = scripted {
            return match outcome {
                Ok(()) => {
                    let url = self.state.lock().url.clone();
                    Ok(ActionReceipt::completed(started_at, 1).with_url(url))
                }
                Err(err) => Err(err),
            };
        }

        let matches = self.matching_elements(selector);
        if matches.is_empty() {
            return Err(DriverError::NotFound(selector.to_string()));
        }

        if action.kind == ActionKind::Scroll {
            // Scrolling brings the target into view.
            let mut state = self.state.lock();
            for el in state.elements.iter_mut() {
                if selector_matches(selector, el) {
                    el.visible = true;
                }
            }
            return Ok(ActionReceipt::completed(started_at, 1));
        }

        let target = &matches[0];
        if !target.visible {
            return Err(DriverError::NotVisible(selector.to_string()));
        }
        if !target.enabled {
            return Err(DriverError::NotEnabled(selector.to_string()));
        }

        let url = self.state.lock().url.clone();
        Ok(ActionReceipt::completed(started_at, 1).with_url(url))
    }

    async fn locator_count(&self, selector: &str) -> Result<usize, DriverError> {
        self.record(format!("locator_count {}", selector));
        Ok(self.matching_elements(selector).len())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        self.record(format!("is_visible {}", selector));
        Ok(self
            .matching_elements(selector)
            .first()
            .map(|el| el.visible)
            .unwrap_or(false))
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool, DriverError> {
        self.record(format!("is_enabled {}", selector));
        Ok(self
            .matching_elements(selector)
            .first()
            .map(|el| el.enabled)
            .unwrap_or(false))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, DriverError> {
        self.record(format!("bounding_box {}", selector));
        Ok(self
            .matching_elements(selector)
            .first()
            .and_then(|el| el.bounding_box))
    }

    async fn viewport_size(&self) -> Result<(f64, f64), DriverError> {
        self.record("viewport_size".to_string());
        Ok(self.state.lock().viewport)
    }

    async fn top_element_at(&self, x: f64, y: f64) -> Result<Option<PageElement>, DriverError> {
        self.record(format!("top_element_at {},{}", x, y));
        let state = self.state.lock();
        Ok(state
            .elements
            .iter()
            .rev()
            .find(|el| {
                el.visible
                    && el
                        .bounding_box
                        .map(|b| b.contains(x, y))
                        .unwrap_or(false)
            })
            .cloned())
    }

    async fn query_elements(
        &self,
        selector: &str,
        limit: usize,
    ) -> Result<Vec<PageElement>, DriverError> {
        self.record(format!("query_elements {}", selector));
        let mut matches = self.matching_elements(selector);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn snapshot_elements(&self, limit: usize) -> Result<Vec<PageElement>, DriverError> {
        self.record("snapshot_elements".to_string());
        let state = self.state.lock();
        Ok(state.elements.iter().take(limit).cloned().collect())
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.record("capture_screenshot".to_string());
        self.state
            .lock()
            .screenshot
            .clone()
            .ok_or_else(|| DriverError::Protocol("no scripted screenshot".to_string()))
    }

    async fn capture_dom(&self) -> Result<String, DriverError> {
        self.record("capture_dom".to_string());
        Ok(self.state.lock().dom.clone())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.record("current_url".to_string());
        Ok(self.state.lock().url.clone())
    }
}

/// Match a compound simple selector against a fixture element.
///
/// Supported: exact fixture-selector equality, `text="..."` (trimmed,
/// case-insensitive), and `tag#id.class[attr="v"]` compounds with `=`,
/// `^=`, `*=` attribute operators. Combinators are not supported and
/// match nothing.
fn selector_matches(selector: &str, el: &PageElement) -> bool {
    let selector = selector.trim();
    if selector.is_empty() {
        return false;
    }
    if el.selector == selector {
        return true;
    }

    if let Some(rest) = selector.strip_prefix("text=") {
        let wanted = rest.trim_matches('"').trim();
        return el
            .text
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case(wanted))
            .unwrap_or(false);
    }

    // Combinators are out of scope for the scripted grammar.
    if selector.contains(char::is_whitespace) || selector.contains('>') {
        return false;
    }

    let mut rest = selector;

    // Leading tag, if any.
    let tag_end = rest
        .find(|c| c == '#' || c == '.' || c == '[')
        .unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && !tag.eq_ignore_ascii_case(&el.tag) && tag != "*" {
        return false;
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        match rest.as_bytes()[0] {
            b'#' => {
                let end = rest[1..]
                    .find(|c| c == '#' || c == '.' || c == '[')
                    .map(|i| i + 1)
                    .unwrap_or(rest.len());
                let id = &rest[1..end];
                if el.id.as_deref() != Some(id) {
                    return false;
                }
                rest = &rest[end..];
            }
            b'.' => {
                let end = rest[1..]
                    .find(|c| c == '#' || c == '.' || c == '[')
                    .map(|i| i + 1)
                    .unwrap_or(rest.len());
                let class = &rest[1..end];
                let has_class = el
                    .class_name
                    .as_deref()
                    .map(|c| c.split_whitespace().any(|token| token == class))
                    .unwrap_or(false);
                if !has_class {
                    return false;
                }
                rest = &rest[end..];
            }
            b'[' => {
                let end = match rest.find(']') {
                    Some(i) => i,
                    None => return false,
                };
                if !attr_clause_matches(&rest[1..end], el) {
                    return false;
                }
                rest = &rest[end + 1..];
            }
            _ => return false,
        }
    }
    true
}

fn attr_clause_matches(clause: &str, el: &PageElement) -> bool {
    let (attr, op, value) = if let Some(pos) = clause.find("^=") {
        (&clause[..pos], "^=", &clause[pos + 2..])
    } else if let Some(pos) = clause.find("*=") {
        (&clause[..pos], "*=", &clause[pos + 2..])
    } else if let Some(pos) = clause.find('=') {
        (&clause[..pos], "=", &clause[pos + 1..])
    } else {
        // Bare [attr] presence test.
        return attr_value(clause.trim(), el).is_some();
    };

    let attr = attr.trim();
    let value = value.trim().trim_matches('"').trim_matches('\'');
    let actual = match attr_value(attr, el) {
        Some(actual) => actual,
        None => return false,
    };
    match op {
        "^=" => actual.starts_with(value),
        "*=" => actual.contains(value),
        _ => actual == value,
    }
}

fn attr_value(attr: &str, el: &PageElement) -> Option<String> {
    match attr {
        "id" => el.id.clone(),
        "aria-label" => el.aria_label.clone(),
        "data-testid" => el.test_id.clone(),
        "type" => el.input_type.clone(),
        "class" => el.class_name.clone(),
        "required" => el.required.then(|| "required".to_string()),
        "pattern" => el.pattern.clone(),
        _ => None,
    }
}
