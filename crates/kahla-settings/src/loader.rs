//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`KahlaSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `KAHLA_*` environment variable overrides (highest priority)
//! 4. [`validate`] the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::io::Write as _;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::KahlaSettings;

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "config.json";

/// Load, override and validate settings from `path`.
pub fn load_settings(path: &Path) -> Result<KahlaSettings> {
    let settings = load_settings_from_path(path)?;
    validate(&settings)?;
    Ok(settings)
}

/// Load settings from `path` with env var overrides, without validation.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<KahlaSettings> {
    let defaults = serde_json::to_value(KahlaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, rename_legacy_keys(user))
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: KahlaSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Top-level keys of settings files written by earlier releases, and the
/// keys they map to.
const LEGACY_KEYS: [(&str, &str); 4] = [
    ("Email", "email"),
    ("Password", "password"),
    ("ServerUrl", "serverUrl"),
    ("OssUrl", "ossUrl"),
];

/// Rename PascalCase top-level keys to their camelCase names.
///
/// A key already present under its camelCase name wins. Other legacy keys
/// are left alone and ignored on deserialization.
pub fn rename_legacy_keys(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };
    for (legacy, current) in LEGACY_KEYS {
        if let Some(found) = map.remove(legacy) {
            if map.contains_key(current) {
                debug!(key = legacy, shadowed_by = current, "ignoring legacy settings key");
            } else {
                let _ = map.insert(current.to_string(), found);
            }
        }
    }
    Value::Object(map)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Check that the settings can drive a client.
pub fn validate(settings: &KahlaSettings) -> Result<()> {
    if settings.email.trim().is_empty() {
        return Err(SettingsError::InvalidValue("email is empty".to_string()));
    }
    if settings.password.is_empty() {
        return Err(SettingsError::InvalidValue("password is empty".to_string()));
    }
    for (name, url) in [
        ("serverUrl", &settings.server_url),
        ("ossUrl", &settings.oss_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "{name} must be an http(s) URL, got {url:?}"
            )));
        }
    }
    if settings.pusher.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "pusher.heartbeatIntervalSecs must be positive".to_string(),
        ));
    }
    if settings.pusher.event_buffer == 0 {
        return Err(SettingsError::InvalidValue(
            "pusher.eventBuffer must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Write a default settings file for first-run setup.
///
/// Fails if `path` already exists. On Unix the file is created with mode
/// `0600` since it will hold a password.
pub fn write_template(path: &Path) -> Result<()> {
    let mut content = serde_json::to_string_pretty(&KahlaSettings::default())?;
    content.push('\n');

    let mut options = std::fs::OpenOptions::new();
    let _ = options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        let _ = options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    debug!(?path, "wrote settings template");
    Ok(())
}

/// Apply `KAHLA_*` environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut KahlaSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides_from(
    settings: &mut KahlaSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("KAHLA_EMAIL") {
        settings.email = v;
    }
    if let Some(v) = string("KAHLA_PASSWORD") {
        settings.password = v;
    }
    if let Some(v) = string("KAHLA_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = string("KAHLA_OSS_URL") {
        settings.oss_url = v;
    }
    if let Some(v) = string("KAHLA_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = string("KAHLA_HEARTBEAT_INTERVAL") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.pusher.heartbeat_interval_secs = secs,
            None => warn!(key = "KAHLA_HEARTBEAT_INTERVAL", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = string("KAHLA_NOTIFY_UNREAD") {
        match parse_bool(&v) {
            Some(b) => settings.notify_unread = b,
            None => warn!(key = "KAHLA_NOTIFY_UNREAD", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
