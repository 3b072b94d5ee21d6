//! Candidate-generating strategies
//!
//! Three cheap strategies in escalation order:
//! 1. Text - locate by the action's human label
//! 2. Attribute - prefix-match a churned id
//! 3. Structural - tag/class skeleton of the original selector
//!
//! Each returns replacement candidates for the healer to verify; none of
//! them touches the live page.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::errors::HealError;
use crate::types::{HealCandidate, HealRequest, HealStrategy};

/// Strategy trait for candidate generation
#[async_trait]
pub trait HealTactic: Send + Sync {
    /// Get strategy type
    fn strategy(&self) -> HealStrategy;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy().name()
    }

    /// Produce replacement candidates for the failing action
    async fn candidates(&self, request: &HealRequest) -> Result<Vec<HealCandidate>, HealError>;
}

static QUOTED_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("quoted fragment regex"));

/// Text and label matching strategy
pub struct TextTactic;

#[async_trait]
impl HealTactic for TextTactic {
    fn strategy(&self) -> HealStrategy {
        HealStrategy::Text
    }

    async fn candidates(&self, request: &HealRequest) -> Result<Vec<HealCandidate>, HealError> {
        let Some(hint) = extract_hint(&request.action.target_hint, &request.action.description)
        else {
            debug!("text strategy has no usable hint");
            return Ok(Vec::new());
        };

        Ok(vec![
            HealCandidate::new(
                format!("text=\"{hint}\""),
                0.9,
                format!("exact text match on \"{hint}\""),
            ),
            HealCandidate::new(
                format!("[aria-label*=\"{hint}\"]"),
                0.8,
                format!("aria-label contains \"{hint}\""),
            ),
            HealCandidate::new(
                format!("[title*=\"{hint}\"]"),
                0.7,
                format!("title contains \"{hint}\""),
            ),
        ])
    }
}

/// Derive the label the element should carry.
///
/// The target hint wins; otherwise the first quoted fragment of the intent
/// description ("click the \"Place order\" button") is taken.
fn extract_hint(target_hint: &str, description: &str) -> Option<String> {
    let direct = target_hint.trim();
    if !direct.is_empty() {
        return Some(sanitize_hint(direct));
    }
    QUOTED_FRAGMENT.captures(description).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| sanitize_hint(m.as_str()))
    })
}

fn sanitize_hint(hint: &str) -> String {
    // Quotes would break the generated locator syntax.
    hint.replace('"', "").trim().to_string()
}

/// Id prefix matching strategy
pub struct AttributeTactic;

#[async_trait]
impl HealTactic for AttributeTactic {
    fn strategy(&self) -> HealStrategy {
        HealStrategy::Attribute
    }

    async fn candidates(&self, request: &HealRequest) -> Result<Vec<HealCandidate>, HealError> {
        let Some(selector) = request.original_selector() else {
            return Ok(Vec::new());
        };
        let Some(id) = extract_id(selector) else {
            debug!(selector, "attribute strategy found no id to work from");
            return Ok(Vec::new());
        };
        let stem = stable_id_prefix(&id);
        if stem.len() < 2 || stem == id {
            return Ok(Vec::new());
        }

        Ok(vec![HealCandidate::new(
            format!("[id^=\"{stem}\"]"),
            0.8,
            format!("id prefix \"{stem}\" after stripping generated suffix"),
        )])
    }
}

/// Pull an id out of a selector, from a `#id` part or an `[id=...]` clause.
fn extract_id(selector: &str) -> Option<String> {
    if let Some(pos) = selector.find('#') {
        let rest = &selector[pos + 1..];
        let end = rest
            .find(|c: char| c == '.' || c == '#' || c == '[' || c == ':' || c.is_whitespace())
            .unwrap_or(rest.len());
        if end > 0 {
            return Some(rest[..end].to_string());
        }
    }
    static ID_CLAUSE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"\[id[*^]?=["']?([^"'\]]+)["']?\]"#).expect("id clause regex"));
    ID_CLAUSE
        .captures(selector)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip trailing generated suffixes (digit runs and their separators).
///
/// "submit-1234" becomes "submit", "btn_42_7" becomes "btn"; an id without
/// a trailing digit run is returned unchanged.
fn stable_id_prefix(id: &str) -> String {
    let mut stem = id;
    loop {
        let digits_trimmed = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        if digits_trimmed.len() == stem.len() {
            break;
        }
        stem = digits_trimmed.trim_end_matches(['-', '_']);
    }
    stem.to_string()
}

/// Tag/class skeleton strategy
pub struct StructuralTactic;

#[async_trait]
impl HealTactic for StructuralTactic {
    fn strategy(&self) -> HealStrategy {
        HealStrategy::Structural
    }

    async fn candidates(&self, request: &HealRequest) -> Result<Vec<HealCandidate>, HealError> {
        let Some(selector) = request.original_selector() else {
            return Ok(Vec::new());
        };
        let Some(skeleton) = structural_skeleton(selector) else {
            return Ok(Vec::new());
        };

        Ok(vec![HealCandidate::new(
            skeleton.clone(),
            0.6,
            format!("structural skeleton of `{selector}`"),
        )])
    }
}

/// Strip id and data-attribute clauses, keeping tag/class structure.
///
/// Returns `None` when nothing survives or nothing changed.
fn structural_skeleton(selector: &str) -> Option<String> {
    let mut kept_segments = Vec::new();
    for segment in selector.split_whitespace() {
        if segment == ">" || segment == "+" || segment == "~" {
            kept_segments.push(segment.to_string());
            continue;
        }
        let stripped = strip_segment(segment);
        if !stripped.is_empty() {
            kept_segments.push(stripped);
        }
    }

    // Combinators with nothing on one side are invalid; drop them.
    while matches!(kept_segments.first().map(String::as_str), Some(">" | "+" | "~")) {
        kept_segments.remove(0);
    }
    while matches!(kept_segments.last().map(String::as_str), Some(">" | "+" | "~")) {
        kept_segments.pop();
    }

    if kept_segments.is_empty() {
        return None;
    }
    let skeleton = kept_segments.join(" ");
    if skeleton == selector.trim() {
        return None;
    }
    Some(skeleton)
}

/// Remove `#id`, `[id...]`, and `[data-...]` parts from one compound segment.
fn strip_segment(segment: &str) -> String {
    let mut kept = String::new();
    let mut rest = segment;

    let head_end = rest
        .find(|c| c == '#' || c == '.' || c == '[')
        .unwrap_or(rest.len());
    kept.push_str(&rest[..head_end]);
    rest = &rest[head_end..];

    while !rest.is_empty() {
        match rest.as_bytes()[0] {
            b'#' => {
                let end = rest[1..]
                    .find(|c| c == '#' || c == '.' || c == '[')
                    .map(|i| i + 1)
                    .unwrap_or(rest.len());
                rest = &rest[end..];
            }
            b'.' => {
                let end = rest[1..]
                    .find(|c| c == '#' || c == '.' || c == '[')
                    .map(|i| i + 1)
                    .unwrap_or(rest.len());
                kept.push_str(&rest[..end]);
                rest = &rest[end..];
            }
            b'[' => {
                let end = match rest.find(']') {
                    Some(i) => i + 1,
                    None => rest.len(),
                };
                let clause = &rest[..end];
                let body = clause.trim_start_matches('[').to_ascii_lowercase();
                if !(body.starts_with("id=")
                    || body.starts_with("id^")
                    || body.starts_with("id*")
                    || body.starts_with("id]")
                    || body.starts_with("data-"))
                {
                    kept.push_str(clause);
                }
                rest = &rest[end..];
            }
            _ => {
                // Pseudo-classes and anything else ride along unchanged.
                kept.push_str(rest);
                break;
            }
        }
    }
    kept
}
