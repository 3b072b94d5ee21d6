//! Error types for driver operations

use thiserror::Error;

/// Message fragments that mark a failure as transient.
///
/// Drivers that only surface stringly errors are classified by scanning the
/// lowercased message for these fragments; anything outside the list is
/// treated as permanent.
pub const RETRYABLE_FRAGMENTS: &[&str] = &[
    "not found",
    "no element",
    "not visible",
    "hidden",
    "timeout",
    "timed out",
    "detached",
    "intercepts pointer",
    "not interactable",
    "waiting for",
];

/// Case-insensitive scan of an error message against [`RETRYABLE_FRAGMENTS`].
pub fn message_is_retryable(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment))
}

/// Structured failure taxonomy for driver operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// Selector could not be parsed by the driver
    #[error("Invalid selector: {0}")]
    SelectorInvalid(String),

    /// No element matched the selector
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Element matched but is not visible
    #[error("Element not visible: {0}")]
    NotVisible(String),

    /// Element matched but is disabled or otherwise not interactable
    #[error("Element not enabled: {0}")]
    NotEnabled(String),

    /// Driver-side wait or navigation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Element handle went stale (frame navigation or re-render)
    #[error("Element detached: {0}")]
    Detached(String),

    /// Selector matched more than one element where one was required
    #[error("Ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// Another element intercepts pointer events at the target point
    #[error("Pointer intercepted: {0}")]
    PointerIntercepted(String),

    /// Transport or protocol failure talking to the browser
    #[error("Driver protocol error: {0}")]
    Protocol(String),

    /// Unclassified driver message, retryability decided by substring scan
    #[error("Driver error: {0}")]
    Opaque(String),
}

impl DriverError {
    /// Check if this failure is worth another attempt
    ///
    /// Structured kinds carry their own answer; `Opaque` falls back to the
    /// message allow-list.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriverError::NotFound(_)
            | DriverError::NotVisible(_)
            | DriverError::NotEnabled(_)
            | DriverError::Timeout(_)
            | DriverError::Detached(_)
            | DriverError::PointerIntercepted(_) => true,
            DriverError::SelectorInvalid(_)
            | DriverError::AmbiguousMatch(_)
            | DriverError::Protocol(_) => false,
            DriverError::Opaque(message) => message_is_retryable(message),
        }
    }

    /// Whether the failure reads as a visibility problem
    ///
    /// The heuristic alternative proposer treats an invisible click target
    /// differently from a missing one.
    pub fn is_visibility_failure(&self) -> bool {
        match self {
            DriverError::NotVisible(_) | DriverError::PointerIntercepted(_) => true,
            DriverError::Opaque(message) => {
                let message = message.to_lowercase();
                message.contains("not visible") || message.contains("hidden")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_scan_is_case_insensitive() {
        assert!(message_is_retryable("Element Not Visible"));
        assert!(message_is_retryable("TIMED OUT after 5000ms"));
        assert!(!message_is_retryable("permission denied"));
    }

    #[test]
    fn test_structured_kinds_override_message() {
        // A protocol fault stays permanent even when its message happens to
        // contain an allow-listed fragment.
        let err = DriverError::Protocol("websocket timed out".to_string());
        assert!(!err.is_retryable());

        let err = DriverError::NotFound("#submit".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_opaque_falls_back_to_scan() {
        assert!(DriverError::Opaque("strict mode: waiting for locator".into()).is_retryable());
        assert!(!DriverError::Opaque("page crashed".into()).is_retryable());
    }

    #[test]
    fn test_visibility_failure_detection() {
        assert!(DriverError::NotVisible("#a".into()).is_visibility_failure());
        assert!(DriverError::PointerIntercepted("#a".into()).is_visibility_failure());
        assert!(DriverError::Opaque("element is hidden".into()).is_visibility_failure());
        assert!(!DriverError::NotFound("#a".into()).is_visibility_failure());
        assert!(!DriverError::Timeout("navigation".into()).is_visibility_failure());
    }
}
