//! Engine configuration: baked-in defaults, an optional YAML file, and
//! `WEBMEND__section__key` environment overrides, applied in that order.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use webmend_flow_testability::AssessorConfig;
use webmend_retry_engine::RetryPolicy;
use webmend_selector_heal::HealConfig;

const ENV_PREFIX: &str = "WEBMEND__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Healing ladder tunables plus the optional memory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingSection {
    #[serde(flatten)]
    pub ladder: HealConfig,

    /// When set, healing memory is loaded from and persisted to this file.
    pub memory_path: Option<PathBuf>,
}

/// Top-level engine configuration.
///
/// Every field has a default, so an empty file and no file at all both
/// produce a working configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempt budget and backoff shape for the retry orchestrator
    pub retry: RetryPolicy,

    /// Scoring thresholds for the testability assessor
    pub assessor: AssessorConfig,

    /// Selector healing tunables
    pub healing: HealingSection,
}

impl EngineConfig {
    /// Load configuration. A missing file is skipped, not an error;
    /// environment variables win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(EngineConfig::default())
            .map_err(|err| ConfigError::Invalid(format!("{}", err)))?;

        if let Some(path) = path {
            if path.exists() {
                deep_merge(&mut merged, value_from_file(path)?);
            }
        }
        deep_merge(&mut merged, value_from_env());

        serde_json::from_value(merged).map_err(|err| ConfigError::Invalid(format!("{}", err)))
    }
}

/// Convenience wrapper over [`EngineConfig::load`].
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    EngineConfig::load(path)
}

fn value_from_file(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(format!("{}", err)))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
    serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(format!("{}", err)))
}

fn value_from_env() -> Value {
    let mut root = Value::Object(Default::default());
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            if raw.trim().is_empty() {
                continue;
            }
            let segments = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>();
            if segments.is_empty() {
                continue;
            }
            insert_path(&mut root, &segments, parse_env_value(&raw));
        }
    }
    root
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn insert_path(target: &mut Value, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            if let Value::Object(map) = target {
                map.insert(leaf.clone(), value);
            }
        }
        [head, rest @ ..] => {
            if let Value::Object(map) = target {
                let slot = map
                    .entry(head.clone())
                    .or_insert_with(|| Value::Object(Default::default()));
                if !slot.is_object() {
                    *slot = Value::Object(Default::default());
                }
                insert_path(slot, rest, value);
            }
        }
    }
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_webmend_env() {
        for (key, _) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                env::remove_var(key);
            }
        }
    }

    fn temp_yaml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults_cover_every_section() {
        clear_webmend_env();
        let config = EngineConfig::load(None).unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.assessor.testable_threshold, 0.7);
        assert_eq!(config.healing.ladder.max_candidates_per_tactic, 10);
        assert!(config.healing.memory_path.is_none());
    }

    #[test]
    #[serial]
    fn test_missing_file_is_skipped() {
        clear_webmend_env();
        let config = EngineConfig::load(Some(Path::new("/nonexistent/webmend.yaml"))).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    #[serial]
    fn test_file_overlays_only_named_keys() {
        clear_webmend_env();
        let file = temp_yaml("retry:\n  max_attempts: 7\nhealing:\n  memory_path: /tmp/heals.json\n");
        let config = EngineConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(
            config.healing.memory_path.as_deref(),
            Some(Path::new("/tmp/heals.json"))
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_win_over_file() {
        clear_webmend_env();
        let file = temp_yaml("retry:\n  max_attempts: 7\n");
        env::set_var("WEBMEND__RETRY__MAX_ATTEMPTS", "9");
        env::set_var("WEBMEND__RETRY__BACKOFF_MULTIPLIER", "2.5");
        env::set_var("WEBMEND__HEALING__VISION_RADIUS_PX", "80");

        let config = EngineConfig::load(Some(file.path())).unwrap();
        clear_webmend_env();

        assert_eq!(config.retry.max_attempts, 9);
        assert!((config.retry.backoff_multiplier - 2.5).abs() < f64::EPSILON);
        assert!((config.healing.ladder.vision_radius_px - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    #[serial]
    fn test_malformed_yaml_is_invalid() {
        clear_webmend_env();
        let file = temp_yaml("retry: [unbalanced\n");
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_env_value_parsing_keeps_types() {
        assert_eq!(parse_env_value("5"), Value::from(5));
        assert_eq!(parse_env_value("2.5"), Value::from(2.5));
        assert_eq!(parse_env_value("true"), Value::Bool(true));
        assert_eq!(
            parse_env_value("text=\"Submit\""),
            Value::String("text=\"Submit\"".into())
        );
    }
}
