//! Persisted memory records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remembered selector recovery
///
/// Created on the first successful heal of `original_selector` on the page
/// identified by `page_signature`; `success_count` grows on every reuse.
/// Entries never cross project boundaries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealingMemoryEntry {
    pub project_id: String,
    pub page_signature: String,
    pub original_selector: String,
    pub healed_selector: String,
    /// Name of the strategy that produced the heal ("text", "attribute", ...)
    pub strategy: String,
    #[serde(default)]
    pub success_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A proven heal handed back to callers
///
/// Carries only what replay needs; the full entry stays inside the store.
#[derive(Clone, Debug, PartialEq)]
pub struct RememberedHeal {
    pub healed_selector: String,
    pub strategy: String,
    pub success_count: u64,
}
