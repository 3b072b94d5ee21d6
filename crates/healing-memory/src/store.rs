//! Concurrent memory store with optional JSON persistence

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use webmend_core_types::ProjectId;

use crate::errors::MemoryError;
use crate::model::{HealingMemoryEntry, RememberedHeal};
use crate::signature::PageSignature;

/// Shared handle to a healing memory implementation.
pub type SharedHealingMemory = Arc<dyn HealingMemory>;

/// Cross-run store of proven selector recoveries
///
/// `get` only ever returns heals that have succeeded at least once, and
/// `upsert_increment` must never lose an increment under concurrent use of
/// the same key.
pub trait HealingMemory: Send + Sync {
    /// Look up a proven heal for `(project, signature, original)`.
    fn get(
        &self,
        project: &ProjectId,
        signature: &PageSignature,
        original_selector: &str,
    ) -> Option<RememberedHeal>;

    /// Record a successful heal, creating the entry or bumping its count.
    fn upsert_increment(
        &self,
        project: &ProjectId,
        signature: &PageSignature,
        original_selector: &str,
        healed_selector: &str,
        strategy: &str,
    );

    /// Counters snapshot for diagnostics.
    fn stats(&self) -> MemoryStatsSnapshot;

    /// Flush to the backing file, when one is configured.
    fn persist_now(&self) -> Result<(), MemoryError>;
}

#[derive(Default)]
struct MemoryMetrics {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    upserts: AtomicU64,
}

impl MemoryMetrics {
    fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of store activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatsSnapshot {
    pub total_lookups: u64,
    pub hit_lookups: u64,
    pub miss_lookups: u64,
    pub hit_rate: f64,
    pub upserts: u64,
    pub current_entries: u64,
    pub total_successes: u64,
}

/// Default [`HealingMemory`] backed by a sharded map and a JSON file
#[derive(Default)]
pub struct HealingMemoryStore {
    inner: DashMap<String, Vec<HealingMemoryEntry>>,
    storage_path: Option<PathBuf>,
    metrics: MemoryMetrics,
}

impl HealingMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by the given file, loading any existing entries.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let store = Self {
            inner: DashMap::new(),
            storage_path: Some(path.clone()),
            metrics: MemoryMetrics::default(),
        };

        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let entries: Vec<HealingMemoryEntry> = serde_json::from_slice(&bytes)
                    .map_err(|err| MemoryError::Format(err.to_string()))?;
                for entry in entries {
                    let key = entry_key(
                        &entry.project_id,
                        &entry.page_signature,
                        &entry.original_selector,
                    );
                    store.inner.entry(key).or_default().push(entry);
                }
            }
        }

        Ok(store)
    }

    /// All entries for a project, most recently used first.
    pub fn entries_for_project(&self, project: &ProjectId) -> Vec<HealingMemoryEntry> {
        let mut entries: Vec<HealingMemoryEntry> = self
            .inner
            .iter()
            .flat_map(|shard| shard.value().clone())
            .filter(|entry| entry.project_id == project.0)
            .collect();
        entries.sort_by_key(|entry| entry.last_used_at.unwrap_or(entry.created_at));
        entries.reverse();
        entries
    }

    fn total_entries(&self) -> usize {
        self.inner.iter().map(|shard| shard.value().len()).sum()
    }

    fn total_successes(&self) -> u64 {
        self.inner
            .iter()
            .flat_map(|shard| {
                shard
                    .value()
                    .iter()
                    .map(|entry| entry.success_count)
                    .collect::<Vec<_>>()
            })
            .sum()
    }

    fn persist_to_disk(&self) -> Result<(), MemoryError> {
        let Some(path) = self.storage_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut all_entries: Vec<HealingMemoryEntry> = Vec::new();
        for shard in self.inner.iter() {
            all_entries.extend(shard.value().clone());
        }
        let json = serde_json::to_vec_pretty(&all_entries)
            .map_err(|err| MemoryError::Format(err.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl HealingMemory for HealingMemoryStore {
    fn get(
        &self,
        project: &ProjectId,
        signature: &PageSignature,
        original_selector: &str,
    ) -> Option<RememberedHeal> {
        let key = entry_key(&project.0, signature.as_str(), original_selector);
        let result = self.inner.get(&key).and_then(|entries| {
            entries
                .iter()
                .filter(|entry| entry.success_count > 0)
                .max_by_key(|entry| {
                    (
                        entry.success_count,
                        entry.last_used_at.unwrap_or(entry.created_at),
                    )
                })
                .map(|entry| RememberedHeal {
                    healed_selector: entry.healed_selector.clone(),
                    strategy: entry.strategy.clone(),
                    success_count: entry.success_count,
                })
        });
        self.metrics.record_lookup(result.is_some());
        result
    }

    fn upsert_increment(
        &self,
        project: &ProjectId,
        signature: &PageSignature,
        original_selector: &str,
        healed_selector: &str,
        strategy: &str,
    ) {
        let key = entry_key(&project.0, signature.as_str(), original_selector);
        let now = Utc::now();

        // The entry guard holds the shard for the whole update, so two
        // concurrent successes on the same key serialize instead of racing.
        let mut entries = self.inner.entry(key).or_default();
        match entries
            .iter_mut()
            .find(|entry| entry.healed_selector == healed_selector)
        {
            Some(existing) => {
                existing.success_count = existing.success_count.saturating_add(1);
                existing.last_used_at = Some(now);
                debug!(
                    original = original_selector,
                    healed = healed_selector,
                    success_count = existing.success_count,
                    "healing memory entry reinforced"
                );
            }
            None => {
                entries.push(HealingMemoryEntry {
                    project_id: project.0.clone(),
                    page_signature: signature.as_str().to_string(),
                    original_selector: original_selector.to_string(),
                    healed_selector: healed_selector.to_string(),
                    strategy: strategy.to_string(),
                    success_count: 1,
                    created_at: now,
                    last_used_at: Some(now),
                });
                debug!(
                    original = original_selector,
                    healed = healed_selector,
                    strategy = strategy,
                    "healing memory entry created"
                );
            }
        }
        drop(entries);

        self.metrics.upserts.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.persist_to_disk() {
            warn!(error = %err, "healing memory persist failed after upsert");
        }
    }

    fn stats(&self) -> MemoryStatsSnapshot {
        let total_lookups = self.metrics.lookups.load(Ordering::Relaxed);
        let hit_lookups = self.metrics.hits.load(Ordering::Relaxed);
        let miss_lookups = self.metrics.misses.load(Ordering::Relaxed);
        let hit_rate = if total_lookups == 0 {
            0.0
        } else {
            hit_lookups as f64 / total_lookups as f64
        };
        MemoryStatsSnapshot {
            total_lookups,
            hit_lookups,
            miss_lookups,
            hit_rate,
            upserts: self.metrics.upserts.load(Ordering::Relaxed),
            current_entries: self.total_entries() as u64,
            total_successes: self.total_successes(),
        }
    }

    fn persist_now(&self) -> Result<(), MemoryError> {
        self.persist_to_disk()
    }
}

fn entry_key(project: &str, signature: &str, original_selector: &str) -> String {
    // Unit separator keeps selector text from colliding with the key format.
    format!("{project}\u{1f}{signature}\u{1f}{original_selector}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> PageSignature {
        PageSignature::compute("https://shop.example/checkout", "<html>checkout</html>")
    }

    #[test]
    fn test_round_trip() {
        let store = HealingMemoryStore::new();
        let project = ProjectId::from("proj-1");
        let sig = signature();

        assert!(store.get(&project, &sig, "#a").is_none());
        store.upsert_increment(&project, &sig, "#a", "#b", "text");

        let heal = store.get(&project, &sig, "#a").unwrap();
        assert_eq!(heal.healed_selector, "#b");
        assert_eq!(heal.strategy, "text");
        assert_eq!(heal.success_count, 1);
    }

    #[test]
    fn test_second_increment_keeps_one_entry() {
        let store = HealingMemoryStore::new();
        let project = ProjectId::from("proj-1");
        let sig = signature();

        store.upsert_increment(&project, &sig, "#a", "#b", "text");
        store.upsert_increment(&project, &sig, "#a", "#b", "text");

        let heal = store.get(&project, &sig, "#a").unwrap();
        assert_eq!(heal.success_count, 2);
        assert_eq!(store.entries_for_project(&project).len(), 1);
    }

    #[test]
    fn test_most_proven_heal_wins() {
        let store = HealingMemoryStore::new();
        let project = ProjectId::from("proj-1");
        let sig = signature();

        store.upsert_increment(&project, &sig, "#a", "#b", "text");
        store.upsert_increment(&project, &sig, "#a", "#c", "attribute");
        store.upsert_increment(&project, &sig, "#a", "#c", "attribute");

        let heal = store.get(&project, &sig, "#a").unwrap();
        assert_eq!(heal.healed_selector, "#c");
        assert_eq!(store.entries_for_project(&project).len(), 2);
    }

    #[test]
    fn test_projects_are_isolated() {
        let store = HealingMemoryStore::new();
        let sig = signature();

        store.upsert_increment(&ProjectId::from("proj-1"), &sig, "#a", "#b", "text");
        assert!(store.get(&ProjectId::from("proj-2"), &sig, "#a").is_none());
    }

    #[test]
    fn test_persistence_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let project = ProjectId::from("proj-1");
        let sig = signature();

        {
            let store = HealingMemoryStore::with_persistence(&path).unwrap();
            store.upsert_increment(&project, &sig, "#a", "#b", "structural");
            store.persist_now().unwrap();
        }

        let reloaded = HealingMemoryStore::with_persistence(&path).unwrap();
        let heal = reloaded.get(&project, &sig, "#a").unwrap();
        assert_eq!(heal.healed_selector, "#b");
        assert_eq!(heal.strategy, "structural");
    }

    #[test]
    fn test_zero_success_entries_never_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let sig = signature();

        let stale = HealingMemoryEntry {
            project_id: "proj-1".to_string(),
            page_signature: sig.as_str().to_string(),
            original_selector: "#a".to_string(),
            healed_selector: "#b".to_string(),
            strategy: "text".to_string(),
            success_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        };
        fs::write(&path, serde_json::to_vec(&vec![stale]).unwrap()).unwrap();

        let store = HealingMemoryStore::with_persistence(&path).unwrap();
        assert!(store.get(&ProjectId::from("proj-1"), &sig, "#a").is_none());
    }

    #[test]
    fn test_stats_counting() {
        let store = HealingMemoryStore::new();
        let project = ProjectId::from("proj-1");
        let sig = signature();

        store.get(&project, &sig, "#a");
        store.upsert_increment(&project, &sig, "#a", "#b", "text");
        store.get(&project, &sig, "#a");

        let stats = store.stats();
        assert_eq!(stats.total_lookups, 2);
        assert_eq!(stats.hit_lookups, 1);
        assert_eq!(stats.miss_lookups, 1);
        assert_eq!(stats.upserts, 1);
        assert_eq!(stats.current_entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
