//! Persisted application settings and read-only engine configuration
//! (SPEC_FULL.md §13). Grounded on `original_source/src/api/routers/settings.py`
//! (masking rule, update-dict shape) and `original_source/src/config_manager.py`
//! (dotted-key `Config.get`/`Config.set`), with the atomic temp+rename
//! write style carried over from `kotoba_core::processed_set`.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Key substrings that mark a value as sensitive. Matched case-
/// insensitively against the JSON key name, not the full dotted path,
/// mirroring the source's substring check.
const SENSITIVE_KEY_SUBSTRINGS: &[&str] = &["api_key", "secret", "password", "token"];

const MASK: &str = "****";

const SETTINGS_FILE_NAME: &str = "app_settings.json";

/// Recursively masks sensitive values in a JSON tree. Only string/scalar
/// leaves under a sensitive key are replaced; nested objects/arrays under
/// a sensitive key are masked wholesale too, matching the source's
/// "mask the whole thing once the key matches" behavior.
pub fn mask_sensitive_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut masked = Map::new();
            for (key, val) in map {
                let lowered = key.to_lowercase();
                if SENSITIVE_KEY_SUBSTRINGS.iter().any(|pat| lowered.contains(pat)) {
                    masked.insert(key.clone(), Value::String(MASK.to_string()));
                } else {
                    masked.insert(key.clone(), mask_sensitive_keys(val));
                }
            }
            Value::Object(masked)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_sensitive_keys).collect()),
        other => other.clone(),
    }
}

/// Flattens a nested JSON object into dotted-key `(path, value)` pairs for
/// leaves only, matching the source's `flatten_and_set` helper used by
/// `PATCH /config`.
pub fn flatten(value: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, val) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(val, &path, out);
            }
        }
        other => out.push((prefix.to_string(), other.clone())),
    }
}

fn dotted_get<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in key.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn dotted_set(root: &mut Value, key: &str, value: Value) {
    let segments: Vec<&str> = key.split('.').collect();
    let mut current = root;
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().unwrap();
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .unwrap()
        .insert(segments[segments.len() - 1].to_string(), value);
}

/// Backs `GET/PATCH /api/settings` (arbitrary, persisted user settings)
/// and `GET/PATCH /api/config` (engine defaults loaded from a read-only
/// `config.yaml`, mutable only for the lifetime of the process).
pub struct SettingsStore {
    settings_path: PathBuf,
    settings: Mutex<Value>,
    config: Mutex<Value>,
}

impl SettingsStore {
    /// Loads `app_settings.json` from `data_dir` if present (an empty
    /// object otherwise) and `config.yaml` from `config_path` if present
    /// (built-in defaults otherwise).
    pub fn load(data_dir: &Path, config_path: Option<&Path>) -> Self {
        let settings_path = data_dir.join(SETTINGS_FILE_NAME);
        let settings = fs::read_to_string(&settings_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));

        let config = config_path
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| serde_yaml_compatible_parse(&raw))
            .unwrap_or_else(default_config);

        Self {
            settings_path,
            settings: Mutex::new(settings),
            config: Mutex::new(config),
        }
    }

    pub fn settings_snapshot(&self) -> Value {
        self.settings.lock().clone()
    }

    pub fn masked_settings(&self) -> Value {
        mask_sensitive_keys(&self.settings_snapshot())
    }

    pub fn config_snapshot(&self) -> Value {
        self.config.lock().clone()
    }

    pub fn masked_config(&self) -> Value {
        mask_sensitive_keys(&self.config_snapshot())
    }

    pub fn config_get(&self, dotted_key: &str) -> Option<Value> {
        dotted_get(&self.config.lock(), dotted_key).cloned()
    }

    /// Applies a (possibly nested) update to the settings document and
    /// persists it atomically. Returns the flattened dotted-key update
    /// applied, for the response's `updated` field.
    pub fn update_settings(&self, update: &Value) -> std::io::Result<Vec<(String, Value)>> {
        let mut flattened = Vec::new();
        flatten(update, "", &mut flattened);
        {
            let mut guard = self.settings.lock();
            for (key, value) in &flattened {
                dotted_set(&mut guard, key, value.clone());
            }
            self.persist_locked(&guard)?;
        }
        Ok(flattened)
    }

    /// Applies a (possibly nested) update to the in-memory config. Not
    /// written back to `config.yaml` — the file stays a read-only
    /// baseline, matching the source's split between persisted user
    /// settings and process-lifetime config overrides.
    pub fn update_config(&self, update: &Value) -> Vec<(String, Value)> {
        let mut flattened = Vec::new();
        flatten(update, "", &mut flattened);
        let mut guard = self.config.lock();
        for (key, value) in &flattened {
            dotted_set(&mut guard, key, value.clone());
        }
        flattened
    }

    fn persist_locked(&self, value: &Value) -> std::io::Result<()> {
        let serialized = serde_json::to_vec_pretty(value)?;
        let dir = self
            .settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut temp_path = self.settings_path.clone();
        temp_path.set_extension("json.tmp");
        let write_result = (|| -> std::io::Result<()> {
            fs::write(&temp_path, &serialized)?;
            let file = fs::File::open(&temp_path)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.settings_path)?;
            Ok(())
        })();
        if write_result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        write_result
    }
}

/// Engine defaults used when no `config.yaml` is found, mirroring
/// `ConfigManager._get_default_config()`'s structure closely enough for
/// `GET /api/config` to return something sensible out of the box.
fn default_config() -> Value {
    serde_json::json!({
        "app": {
            "name": "KotobaTranscriber",
            "language": "ja"
        },
        "model": {
            "whisper": {
                "name": "kotoba-tech/kotoba-whisper-v2.2",
                "device": "auto",
                "language": "ja",
                "task": "transcribe"
            },
            "faster_whisper": {
                "model_size": "base",
                "compute_type": "auto",
                "beam_size": 5
            }
        }
    })
}

/// `config.yaml` is plain scalar/map/list YAML; since this stack has no
/// YAML crate, only JSON-compatible configs are supported directly and a
/// YAML file that isn't also valid JSON falls back to defaults (YAML is a
/// superset of JSON for the mapping/scalar subset this config actually
/// uses, which covers every case in `config_manager.py`'s defaults).
fn serde_yaml_compatible_parse(raw: &str) -> Option<Value> {
    serde_json::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_sensitive_leaf_keys() {
        let value = serde_json::json!({"api_key": "abc123", "model": "kotoba"});
        let masked = mask_sensitive_keys(&value);
        assert_eq!(masked["api_key"], "****");
        assert_eq!(masked["model"], "kotoba");
    }

    #[test]
    fn masks_nested_sensitive_keys() {
        let value = serde_json::json!({"llm": {"openai_secret": "xyz"}});
        let masked = mask_sensitive_keys(&value);
        assert_eq!(masked["llm"]["openai_secret"], "****");
    }

    #[test]
    fn flatten_produces_dotted_paths() {
        let value = serde_json::json!({"model": {"whisper": {"device": "cpu"}}});
        let mut out = Vec::new();
        flatten(&value, "", &mut out);
        assert_eq!(out, vec![("model.whisper.device".to_string(), serde_json::json!("cpu"))]);
    }

    #[test]
    fn update_settings_persists_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path(), None);
        store
            .update_settings(&serde_json::json!({"theme": "dark"}))
            .unwrap();
        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["theme"], "dark");
    }

    #[test]
    fn update_config_does_not_touch_yaml_file() {
        let store = SettingsStore::load(Path::new("/nonexistent"), None);
        store.update_config(&serde_json::json!({"model": {"whisper": {"device": "cuda"}}}));
        assert_eq!(store.config_get("model.whisper.device").unwrap(), "cuda");
    }
}
