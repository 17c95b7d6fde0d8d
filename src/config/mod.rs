//! User preferences and persistent state locations.
//!
//! This module provides user preference management with XDG Base Directory
//! compliance.

pub mod settings;

pub use settings::{SettingsError, SettingsManager, UserSettings, get_cache_dir, get_config_path};
