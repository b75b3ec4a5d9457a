//! Environment Configuration Loader
//!
//! Loads environment variables from the canonical location: `/etc/op-runtime/environment`
//! and builds the [`RuntimeConfig`] consumed by the tool runner and job service.
//!
//! ## Usage
//!
//! Call `load_environment()` early in main() before reading any config:
//!
//! ```rust
//! use op_core::config::{load_environment, RuntimeConfig};
//!
//! load_environment();
//! let config = RuntimeConfig::from_env();
//! assert!(config.max_payload_depth > 0);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default path for the environment file
pub const DEFAULT_ENV_FILE: &str = "/etc/op-runtime/environment";

/// Alternative paths to check (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &[
    "/etc/op-runtime/environment",
    "/etc/op-runtime.env",
    ".env",
];

pub const DEFAULT_MAX_PAYLOAD_DEPTH: usize = 32;
pub const DEFAULT_JOB_EVENT_CAPACITY: usize = 1000;

/// Load environment variables from the canonical configuration file.
///
/// This function:
/// 1. Honours `OP_ENV_FILE` when set
/// 2. Checks `/etc/op-runtime/environment` (system-wide)
/// 3. Falls back to `.env` in current directory (development)
/// 4. Does NOT override existing environment variables
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("OP_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Try to load an environment file from the given path.
fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();

                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}={}", key, display_value(&key, &value));
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Value as it may appear in logs; credentials are masked
fn display_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single environment line into key-value pair.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    // Handle: KEY=VALUE, KEY="VALUE", KEY='VALUE'
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Positive integer or None; zero, negatives and garbage all mean "unset"
fn get_config_positive(key: &str) -> Option<u64> {
    u64::try_from(get_config_int(key, 0))
        .ok()
        .filter(|v| *v > 0)
}

/// Runtime settings for plugin execution and job bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Per-invocation timeout; None means the runner waits indefinitely
    pub plugin_timeout_ms: Option<u64>,
    /// Cap on concurrently running plugin calls; None means unbounded
    pub max_concurrent_plugins: Option<usize>,
    /// Maximum nesting depth accepted in request payloads
    pub max_payload_depth: usize,
    /// Buffer size of the job event channel
    pub job_event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugin_timeout_ms: None,
            max_concurrent_plugins: None,
            max_payload_depth: DEFAULT_MAX_PAYLOAD_DEPTH,
            job_event_capacity: DEFAULT_JOB_EVENT_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Build from `OP_PLUGIN_TIMEOUT_MS`, `OP_MAX_CONCURRENT_PLUGINS`,
    /// `OP_MAX_PAYLOAD_DEPTH` and `OP_JOB_EVENT_CAPACITY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            plugin_timeout_ms: get_config_positive("OP_PLUGIN_TIMEOUT_MS"),
            max_concurrent_plugins: get_config_positive("OP_MAX_CONCURRENT_PLUGINS")
                .map(|v| v as usize),
            max_payload_depth: get_config_positive("OP_MAX_PAYLOAD_DEPTH")
                .map(|v| v as usize)
                .unwrap_or(defaults.max_payload_depth),
            job_event_capacity: get_config_positive("OP_JOB_EVENT_CAPACITY")
                .map(|v| v as usize)
                .unwrap_or(defaults.job_event_capacity),
        }
    }

    pub fn with_plugin_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.plugin_timeout_ms = Some(timeout_ms).filter(|v| *v > 0);
        self
    }

    pub fn with_max_concurrent_plugins(mut self, max: usize) -> Self {
        self.max_concurrent_plugins = Some(max).filter(|v| *v > 0);
        self
    }

    pub fn plugin_timeout(&self) -> Option<Duration> {
        self.plugin_timeout_ms.map(Duration::from_millis)
    }
}
