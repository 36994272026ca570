//! Client configuration with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientConfig::default()`]
//! 2. If `~/.examark/config.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use examark_sync::SyncOptions;

/// Default marking-service origin.
pub const DEFAULT_BASE_URL: &str = "https://api.examark.app";

/// Model identity sent with a job when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "standard";

/// Errors that can occur when loading or parsing client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the config file.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A required value was never provided.
    #[error("missing required value: {0}")]
    Missing(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Marking-service origin, scheme included, no trailing slash required.
    pub base_url: String,
    /// Bearer token for authenticated endpoints.
    pub api_key: Option<String>,
    /// Account the session list belongs to.
    pub user_id: Option<String>,
    /// Model identity sent with jobs unless overridden per call.
    pub default_model: String,
    /// Per-request timeout for the session REST endpoints, in milliseconds.
    /// Job streams are exempt; they run until the stream ends.
    pub request_timeout_ms: u64,
    /// Page size for session list requests.
    pub page_size: usize,
    /// Bound on cached sidebar summaries.
    pub summary_capacity: usize,
    /// Character budget for summary previews.
    pub preview_max_chars: usize,
    /// Cooldown during which repeat deliveries of a session are dropped,
    /// in milliseconds.
    pub merge_cooldown_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            user_id: None,
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout_ms: 30_000,
            page_size: 20,
            summary_capacity: 50,
            preview_max_chars: 120,
            merge_cooldown_ms: 2_000,
        }
    }
}

impl ClientConfig {
    /// Join `path` onto the configured origin, normalizing slashes.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Per-request timeout for the session REST endpoints.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Synchronizer tunables derived from this configuration.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            summary_capacity: self.summary_capacity,
            preview_max_chars: self.preview_max_chars,
            merge_cooldown: Duration::from_millis(self.merge_cooldown_ms),
        }
    }
}

/// Resolve the path to the config file (`~/.examark/config.json`).
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".examark").join("config.json")
}

/// Load configuration from the default path with env var overrides.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from_path(&config_path())
}

/// Load configuration from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig> {
    let defaults = serde_json::to_value(ClientConfig::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading config from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: ClientConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded configuration.
///
/// Integers must be valid and within the specified range; invalid values
/// are silently ignored (fall back to file/default).
pub fn apply_env_overrides(config: &mut ClientConfig) {
    if let Some(v) = read_env_string("EXAMARK_BASE_URL") {
        config.base_url = v;
    }
    if let Some(v) = read_env_string("EXAMARK_API_KEY") {
        config.api_key = Some(v);
    }
    if let Some(v) = read_env_string("EXAMARK_USER_ID") {
        config.user_id = Some(v);
    }
    if let Some(v) = read_env_string("EXAMARK_DEFAULT_MODEL") {
        config.default_model = v;
    }
    if let Some(v) = read_env_u64("EXAMARK_TIMEOUT_MS", 1_000, 600_000) {
        config.request_timeout_ms = v;
    }
    if let Some(v) = read_env_usize("EXAMARK_PAGE_SIZE", 1, 100) {
        config.page_size = v;
    }
    if let Some(v) = read_env_usize("EXAMARK_SUMMARY_CAPACITY", 1, 1_000) {
        config.summary_capacity = v;
    }
    if let Some(v) = read_env_usize("EXAMARK_PREVIEW_CHARS", 16, 2_000) {
        config.preview_max_chars = v;
    }
    if let Some(v) = read_env_u64("EXAMARK_MERGE_COOLDOWN_MS", 0, 60_000) {
        config.merge_cooldown_ms = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"pageSize": 20, "baseUrl": "https://api.examark.app"});
        let source = serde_json::json!({"pageSize": 50});
        let merged = deep_merge(target, source);
        assert_eq!(merged["pageSize"], 50);
        assert_eq!(merged["baseUrl"], "https://api.examark.app");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"apiKey": "secret", "pageSize": 20});
        let source = serde_json::json!({"apiKey": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["apiKey"], "secret");
    }

    #[test]
    fn merge_new_keys_added() {
        let target = serde_json::json!({"pageSize": 20});
        let source = serde_json::json!({"userId": "user-1"});
        let merged = deep_merge(target, source);
        assert_eq!(merged["pageSize"], 20);
        assert_eq!(merged["userId"], "user-1");
    }

    #[test]
    fn merge_array_replace_not_merge() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    // ── load_config_from_path ───────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/config.json");
        let config = load_config_from_path(path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"baseUrl": "http://localhost:3000", "pageSize": 5}"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.page_size, 5);
        // Untouched fields keep their defaults.
        assert_eq!(config.summary_capacity, 50);
        assert_eq!(config.merge_cooldown_ms, 2_000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_config_from_path(&path);
        assert!(matches!(result.unwrap_err(), ConfigError::Json(_)));
    }

    #[test]
    fn load_unknown_keys_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"futureKnob": true, "userId": "user-9"}"#).unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("user-9"));
    }

    // ── endpoint joining ────────────────────────────────────────────

    #[test]
    fn endpoint_normalizes_slashes() {
        let trailing = ClientConfig {
            base_url: "http://localhost:3000/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(trailing.endpoint("/mark"), "http://localhost:3000/mark");
        assert_eq!(trailing.endpoint("mark"), "http://localhost:3000/mark");

        let bare = ClientConfig {
            base_url: "http://localhost:3000".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(bare.endpoint("/mark"), "http://localhost:3000/mark");
    }

    // ── sync options mapping ────────────────────────────────────────

    #[test]
    fn sync_options_reflect_config() {
        let config = ClientConfig {
            summary_capacity: 7,
            preview_max_chars: 64,
            merge_cooldown_ms: 250,
            ..ClientConfig::default()
        };
        let options = config.sync_options();
        assert_eq!(options.summary_capacity, 7);
        assert_eq!(options.preview_max_chars, 64);
        assert_eq!(options.merge_cooldown, Duration::from_millis(250));
    }

    // ── range parsing ───────────────────────────────────────────────

    #[test]
    fn parse_u64_valid() {
        assert_eq!(parse_u64_range("30000", 1_000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("1000", 1_000, 600_000), Some(1_000));
    }

    #[test]
    fn parse_u64_out_of_range() {
        assert_eq!(parse_u64_range("500", 1_000, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1_000, 600_000), None);
    }

    #[test]
    fn parse_u64_invalid() {
        assert_eq!(parse_u64_range("abc", 1_000, 600_000), None);
        assert_eq!(parse_u64_range("", 1_000, 600_000), None);
    }

    #[test]
    fn parse_usize_valid_and_bounds() {
        assert_eq!(parse_usize_range("50", 1, 100), Some(50));
        assert_eq!(parse_usize_range("0", 1, 100), None);
        assert_eq!(parse_usize_range("200", 1, 100), None);
    }
}
