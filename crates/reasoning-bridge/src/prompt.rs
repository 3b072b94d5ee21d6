//! Prompt templates for reasoning calls
//!
//! Prompts are bounded: candidate lists are capped and element text is
//! truncated so a pathological page can never blow up the request.

use crate::model::ProposalContext;
use webmend_driver_bridge::PageElement;

/// Upper bound on candidate elements included in a proposal prompt.
pub const MAX_PROMPT_CANDIDATES: usize = 20;

/// Longest element text fragment quoted in a prompt.
pub const MAX_TEXT_FRAGMENT: usize = 60;

/// System prompt for the alternative-action proposal call.
pub const PROPOSAL_SYSTEM_PROMPT: &str = r##"You help an automated web test recover from a failed interaction. Given the failed action, the driver error, and the interactive elements currently on the page, propose ONE different action that accomplishes the same intent.

Rules:
- Propose a genuinely different action: a different selector, element, or interaction kind. Never repeat the failed action unchanged.
- Only reference selectors from the provided element list.
- Prefer elements whose text or label matches the stated intent.

Respond with valid JSON in exactly this format:
```json
{
  "action": {"kind": "click", "target_hint": "Submit button", "selector": "#submit", "value": null, "description": "click the submit button"},
  "confidence": 0.8,
  "reasoning": "one sentence"
}
```
The confidence field is required and must be between 0.0 and 1.0."##;

/// System prompt for the visual localization call.
pub const LOCALIZATION_SYSTEM_PROMPT: &str = r#"You locate UI elements in a screenshot of a web page. Given a description of a missing element, return the interactive elements you can identify near where it should be.

Respond with valid JSON: an array of objects, each with "selector", "tag", "text", and a "bounding_box" of {"x", "y", "width", "height"} in page pixels."#;

/// Build the user message for an alternative-action proposal.
pub fn format_proposal_prompt(context: &ProposalContext) -> String {
    let mut message = String::new();

    message.push_str("## Failed action\n");
    message.push_str(&format!(
        "kind: {}\nintent: {}\nselector: {}\n",
        context.failed_action.kind.name(),
        context.failed_action.description,
        context.failed_action.selector.as_deref().unwrap_or("-"),
    ));
    if let Some(value) = &context.failed_action.value {
        message.push_str(&format!("value: {}\n", truncate_fragment(value)));
    }

    message.push_str("\n## Driver error\n");
    message.push_str(&context.error_text);
    message.push('\n');

    if !context.page_url.is_empty() {
        message.push_str(&format!("\n## Page\n{}\n", context.page_url));
    }

    message.push_str("\n## Interactive elements\n");
    if context.candidates.is_empty() {
        message.push_str("(none reported)\n");
    }
    for element in context.candidates.iter().take(MAX_PROMPT_CANDIDATES) {
        message.push_str(&format_candidate_line(element));
    }
    if context.candidates.len() > MAX_PROMPT_CANDIDATES {
        message.push_str(&format!(
            "... and {} more (omitted)\n",
            context.candidates.len() - MAX_PROMPT_CANDIDATES
        ));
    }

    message.push_str("\nPropose one alternative action as JSON.\n");
    message
}

/// Build the user message for a visual localization call.
pub fn format_localization_prompt(target_hint: &str, original_selector: &str) -> String {
    format!(
        "The element \"{}\" (previously matched by `{}`) no longer resolves. \
         Identify interactive elements in the screenshot that could be it, \
         with their positions.",
        truncate_fragment(target_hint),
        original_selector,
    )
}

fn format_candidate_line(element: &PageElement) -> String {
    let mut line = format!("- {}", element.tag);
    if let Some(input_type) = &element.input_type {
        line.push_str(&format!("[type={}]", input_type));
    }
    if let Some(text) = element.text.as_deref().filter(|t| !t.trim().is_empty()) {
        line.push_str(&format!(" \"{}\"", truncate_fragment(text.trim())));
    } else if let Some(label) = &element.aria_label {
        line.push_str(&format!(" aria=\"{}\"", truncate_fragment(label)));
    }
    line.push_str(&format!(" selector={}\n", element.selector));
    line
}

fn truncate_fragment(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_FRAGMENT {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(MAX_TEXT_FRAGMENT).collect();
        format!("{prefix}…")
    }
}
