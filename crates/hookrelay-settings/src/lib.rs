//! # hookrelay-settings
//!
//! Settings for the relay server and client with a three-layer loading
//! flow: compiled defaults, deep-merged user file
//! (`~/.hookrelay/settings.json`), then environment variable overrides.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ClientSettings, LogLevel, LoggingSettings, RelaySettings, ServerSettings};
