use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "client_id",
    "_token",
    "credential",
];

/// Environment variables that override the YAML file, with their target path.
const ENV_OVERRIDES: [(&str, &[&str]); 7] = [
    ("CLIENT_ID", &["oauth", "client_id"]),
    ("CLIENT_SECRET", &["oauth", "client_secret"]),
    ("REDIRECT_URI", &["oauth", "redirect_uri"]),
    ("DATABASE_URL", &["database", "url"]),
    ("OPENAI_KEY", &["openai", "api_key"]),
    ("OPENAI_BASE_URL", &["openai", "base_url"]),
    ("PORT", &["server", "port"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("RAGCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        self.paths.data_dir.join("config.yml")
    }

    /// Loads `config.yml` and overlays the process environment.
    ///
    /// Secrets are not validated here; a missing key surfaces on first use.
    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let file_config = load_yaml_file(&self.config_path());
        let overrides = env_overrides(|key| env::var(key).ok());
        settings_from_value(deep_merge(&file_config, &overrides))
    }

    pub fn redact_sensitive_values(&self, settings: &Settings) -> Value {
        let value = serde_json::to_value(settings).unwrap_or(Value::Null);
        redact_sensitive_values(&value)
    }
}

fn settings_from_value(value: Value) -> Result<Settings, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Internal(format!("Invalid configuration: {}", e)))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Value {
    let mut overrides = Value::Object(Map::new());
    for (key, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(key) else {
            continue;
        };
        let value = if key == "PORT" {
            match raw.parse::<u16>() {
                Ok(port) => json!(port),
                Err(_) => continue,
            }
        } else {
            Value::String(raw)
        };
        ensure_object_path(&mut overrides, path, value);
    }
    overrides
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                let is_set = val.as_str().map(|s| !s.is_empty()).unwrap_or(!val.is_null());
                if is_sensitive_key(key) && is_set {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
