//! Settings collaborator: a narrow key/value view over user preferences.
//!
//! The scan core only reads from settings. Persisting them belongs to the
//! surrounding application.

use crate::core::error::{Error, Result};
use crate::core::types::{ExclusionKind, ExclusionRule, ExclusionSet};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Key holding the global exclusion list.
pub const EXCLUSION_PATTERNS_KEY: &str = "exclusion_patterns";

/// Read access to a key/value settings store.
pub trait SettingsStore: Send + Sync {
    /// Look up a raw value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Look up a value, falling back to `default` when absent.
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

/// Settings backed by a JSON object file.
#[derive(Debug, Clone, Default)]
pub struct JsonSettings {
    values: Map<String, Value>,
}

impl JsonSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read settings file: {}", e)))?;

        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(Error::ConfigLoad(
                "Settings file must contain a JSON object".to_string(),
            )),
        }
    }

    /// Load settings, or start empty when the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// In-memory settings, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, Value>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

impl ExclusionSet {
    /// Build the global exclusion set from the `exclusion_patterns` setting.
    ///
    /// Entries look like `{"pattern": "...", "type": "file|directory|pattern",
    /// "enabled": bool}`. Entries without a usable pattern are skipped and a
    /// missing `enabled` counts as enabled.
    pub fn from_settings(settings: &dyn SettingsStore) -> Self {
        let raw = settings.get_or(EXCLUSION_PATTERNS_KEY, Value::Array(Vec::new()));
        let Value::Array(entries) = raw else {
            log::warn!("Ignoring malformed {} setting", EXCLUSION_PATTERNS_KEY);
            return Self::default();
        };

        let rules = entries
            .iter()
            .filter_map(|entry| {
                let pattern = entry.get("pattern")?.as_str()?.trim();
                if pattern.is_empty() {
                    return None;
                }
                let kind = entry
                    .get("type")
                    .and_then(Value::as_str)
                    .map(ExclusionKind::from_setting)
                    .unwrap_or(ExclusionKind::Pattern);
                let enabled = entry.get("enabled").and_then(Value::as_bool).unwrap_or(true);
                Some(ExclusionRule {
                    pattern: pattern.to_string(),
                    kind,
                    enabled,
                })
            })
            .collect();

        Self {
            rules,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_exclusions_from_settings() {
        let settings = MemorySettings::new().with(
            EXCLUSION_PATTERNS_KEY,
            json!([
                {"pattern": "*.log", "type": "pattern", "enabled": true},
                {"pattern": "node_modules", "type": "directory"},
                {"pattern": "/srv/big.iso", "type": "file", "enabled": false},
                {"pattern": "   ", "type": "file"},
                {"type": "file"}
            ]),
        );

        let set = ExclusionSet::from_settings(&settings);
        assert_eq!(set.rules.len(), 3);
        assert_eq!(set.rules[1].kind, ExclusionKind::Directory);
        assert!(set.rules[1].enabled);
        assert!(!set.rules[2].enabled);
    }

    #[test]
    fn test_missing_or_malformed_setting() {
        let set = ExclusionSet::from_settings(&MemorySettings::new());
        assert!(set.is_empty());

        let settings = MemorySettings::new().with(EXCLUSION_PATTERNS_KEY, json!("nope"));
        assert!(ExclusionSet::from_settings(&settings).is_empty());
    }

    #[test]
    fn test_json_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"exclusion_patterns": [{"pattern": ".git", "type": "directory", "enabled": true}]}"#,
        )
        .unwrap();

        let settings = JsonSettings::load(&path).unwrap();
        assert_eq!(settings.get_or("missing", json!(3)), json!(3));
        let set = ExclusionSet::from_settings(&settings);
        assert_eq!(set.rules, vec![ExclusionRule::new(".git", ExclusionKind::Directory)]);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonSettings::load(&path).is_err());
        assert!(JsonSettings::load_or_default(&dir.path().join("nope.json"))
            .get("exclusion_patterns")
            .is_none());
    }
}
