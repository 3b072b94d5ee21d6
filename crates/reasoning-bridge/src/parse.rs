//! Parsing of provider responses
//!
//! Providers answer in JSON, usually wrapped in a markdown fence. Responses
//! without a parseable action or without a confidence score are rejected
//! here so callers only ever see structured proposals.

use serde::Deserialize;
use webmend_driver_bridge::{Action, BoundingBox, PageElement};

use crate::errors::ReasoningError;
use crate::model::ProposedAction;

#[derive(Deserialize)]
struct RawProposal {
    action: Action,
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a proposal response into a [`ProposedAction`].
pub fn parse_proposed_action(raw: &str) -> Result<ProposedAction, ReasoningError> {
    let body = strip_code_fences(raw);
    let proposal: RawProposal = serde_json::from_str(body)
        .map_err(|err| ReasoningError::malformed(format!("proposal JSON: {err}")))?;

    let confidence = proposal
        .confidence
        .ok_or_else(|| ReasoningError::malformed("proposal carries no confidence score"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ReasoningError::malformed(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(ProposedAction {
        action: proposal.action,
        confidence,
        reasoning: proposal.reasoning,
    })
}

#[derive(Deserialize)]
struct RawLocalizedElement {
    selector: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    bounding_box: Option<RawBox>,
}

#[derive(Deserialize)]
struct RawBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Parse a localization response into element snapshots.
pub fn parse_localized_elements(raw: &str) -> Result<Vec<PageElement>, ReasoningError> {
    let body = strip_code_fences(raw);
    let raw_elements: Vec<RawLocalizedElement> = serde_json::from_str(body)
        .map_err(|err| ReasoningError::malformed(format!("localization JSON: {err}")))?;

    Ok(raw_elements
        .into_iter()
        .map(|raw| {
            let mut element =
                PageElement::new(raw.selector, raw.tag.unwrap_or_else(|| "div".to_string()));
            if let Some(text) = raw.text {
                element = element.with_text(text);
            }
            if let Some(b) = raw.bounding_box {
                element = element.with_box(BoundingBox::new(b.x, b.y, b.width, b.height));
            }
            element
        })
        .collect())
}

/// Strip a surrounding ```json ... ``` fence, if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmend_driver_bridge::ActionKind;

    #[test]
    fn test_parse_fenced_proposal() {
        let raw = r##"```json
{"action": {"kind": "click", "selector": "#pay", "target_hint": "Pay"}, "confidence": 0.75, "reasoning": "visible button"}
```"##;
        let proposed = parse_proposed_action(raw).unwrap();
        assert_eq!(proposed.action.kind, ActionKind::Click);
        assert_eq!(proposed.action.selector.as_deref(), Some("#pay"));
        assert_eq!(proposed.confidence, 0.75);
    }

    #[test]
    fn test_missing_confidence_is_rejected() {
        let raw = r##"{"action": {"kind": "click", "selector": "#pay"}}"##;
        let err = parse_proposed_action(raw).unwrap_err();
        assert!(matches!(err, ReasoningError::Malformed(_)));
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let raw = r##"{"action": {"kind": "click", "selector": "#pay"}, "confidence": 1.5}"##;
        assert!(parse_proposed_action(raw).is_err());
    }

    #[test]
    fn test_prose_is_rejected() {
        let err = parse_proposed_action("I would suggest clicking the other button.").unwrap_err();
        assert!(matches!(err, ReasoningError::Malformed(_)));
    }

    #[test]
    fn test_parse_localized_elements() {
        let raw = r##"[{"selector": "#pay", "tag": "button", "text": "Pay now", "bounding_box": {"x": 10.0, "y": 20.0, "width": 80.0, "height": 30.0}}]"##;
        let elements = parse_localized_elements(raw).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag, "button");
        assert!(elements[0].bounding_box.is_some());
    }
}
