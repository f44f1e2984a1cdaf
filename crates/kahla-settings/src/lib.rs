//! # kahla-settings
//!
//! Configuration for the Kahla notifier.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`KahlaSettings::default()`]
//! 2. **Settings file**: `config.json` by default, deep-merged over defaults
//! 3. **Environment variables**: `KAHLA_*` overrides (highest priority)
//!
//! A missing file is not an error at load time; the binary writes a template
//! with [`write_template`] instead and asks for credentials.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    DEFAULT_SETTINGS_FILE, apply_env_overrides, deep_merge, load_settings,
    load_settings_from_path, validate, write_template,
};
pub use types::{KahlaSettings, PusherSettings, RetrySettings};
