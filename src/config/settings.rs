//! User preference management with XDG Base Directory compliance.
//!
//! Settings are stored as JSON under the XDG config directory; the sync
//! snapshot store lives under the XDG cache directory.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::PathBuf,
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

/// Application directory name below the XDG base directories.
const APP_DIR: &str = "xplay-library";

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// Serializable user settings structure with default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Primary music library directory.
    pub library_directory: Option<String>,
    /// Directory of the mobile copy compared against the primary library.
    pub mobile_library_directory: Option<String>,
    /// File extensions (without dot) accepted as tracks.
    pub track_extensions: Vec<String>,
    /// Whether dot-entries are scanned as artists, albums or tracks.
    pub include_hidden: bool,
    /// Whether synchronization removes content only found in the mobile copy.
    pub sync_remove_additional: bool,
    /// Whether tracks with the same name but different sizes are re-copied.
    pub sync_check_file_size: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            library_directory: None,
            mobile_library_directory: None,
            track_extensions: ["flac", "mp3", "aac", "m4a", "opus", "ogg", "wav", "aiff", "aif"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            include_hidden: false,
            sync_remove_additional: false,
            sync_check_file_size: true,
        }
    }
}

impl UserSettings {
    /// Checks values that cannot be expressed through the type alone.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` for an empty extension list or
    /// an extension containing a path separator or a dot.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.track_extensions.is_empty() {
            return Err(SettingsError::InvalidValue {
                reason: "track_extensions must not be empty".to_string(),
            });
        }
        if let Some(bad) = self
            .track_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.contains(['/', '\\', '.']))
        {
            return Err(SettingsError::InvalidValue {
                reason: format!("invalid track extension {bad:?}"),
            });
        }
        Ok(())
    }
}

/// Handles loading, saving, and validation of user preferences.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe user settings storage.
    settings: RwLock<UserSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl SettingsManager {
    /// Creates a new settings manager with the default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Custom path for the settings file
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk or
    /// the stored values are invalid.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = config_path.parent() {
            create_dir_all(parent)?;
        }

        let settings: UserSettings = if config_path.exists() {
            debug!("Loading settings from existing file: {:?}", config_path);
            let contents = read_to_string(&config_path)?;
            from_str(&contents)?
        } else {
            debug!("Using default settings, no file at {:?}", config_path);
            UserSettings::default()
        };
        settings.validate()?;

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.settings.read()
    }

    /// Gets the configuration file path.
    pub fn get_config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Validates and applies new settings, then saves them to disk.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be
    /// saved. Invalid settings are not applied.
    pub fn update_settings(&self, new_settings: UserSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        *self.settings.write() = new_settings;
        self.save_settings()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!("Saving settings to file: {:?}", self.config_path);
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Path of the settings file below the XDG config directory.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = xdg_home("XDG_CONFIG_HOME", ".config");
    config_dir.push(APP_DIR);
    config_dir.push("settings.json");
    config_dir
}

/// Cache directory of the application below the XDG cache directory.
#[must_use]
pub fn get_cache_dir() -> PathBuf {
    let mut cache_dir = xdg_home("XDG_CACHE_HOME", ".cache");
    cache_dir.push(APP_DIR);
    cache_dir
}

/// Resolves an XDG base directory: the variable when set and non-empty,
/// otherwise `$HOME/<fallback>`.
fn xdg_home(variable: &str, fallback: &str) -> PathBuf {
    if let Ok(dir) = var(variable)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(fallback);
        return path;
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use serde_json::{from_str, to_string};
    use tempfile::TempDir;

    use crate::config::settings::{SettingsError, SettingsManager, UserSettings};

    #[test]
    fn test_user_settings_default() {
        let settings = UserSettings::default();
        assert!(settings.library_directory.is_none());
        assert!(settings.track_extensions.contains(&"flac".to_string()));
        assert!(!settings.include_hidden);
        assert!(settings.sync_check_file_size);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_user_settings_serialization() {
        let settings = UserSettings {
            library_directory: Some("/music".to_string()),
            mobile_library_directory: Some("/media/phone/music".to_string()),
            track_extensions: vec!["flac".to_string()],
            include_hidden: true,
            sync_remove_additional: true,
            sync_check_file_size: false,
        };

        let serialized = to_string(&settings).unwrap();
        let deserialized: UserSettings = from_str(&serialized).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: UserSettings = from_str(r#"{"library_directory":"/music"}"#).unwrap();
        assert_eq!(settings.library_directory.as_deref(), Some("/music"));
        assert_eq!(
            settings.track_extensions,
            UserSettings::default().track_extensions
        );
    }

    #[test]
    fn test_invalid_extensions_rejected() {
        let settings = UserSettings {
            track_extensions: vec![".flac".to_string()],
            ..UserSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue { .. })
        ));

        let empty = UserSettings {
            track_extensions: vec![],
            ..UserSettings::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_settings_manager_round_trip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config").join("settings.json");

        let manager = SettingsManager::with_config_path(path.clone()).unwrap();
        assert_eq!(*manager.get_settings(), UserSettings::default());

        let updated = UserSettings {
            library_directory: Some("/srv/music".to_string()),
            ..UserSettings::default()
        };
        manager.update_settings(updated.clone()).unwrap();

        let reloaded = SettingsManager::with_config_path(path).unwrap();
        assert_eq!(*reloaded.get_settings(), updated);
    }

    #[test]
    fn test_invalid_update_is_not_applied() {
        let temp_dir = TempDir::new().unwrap();
        let manager =
            SettingsManager::with_config_path(temp_dir.path().join("settings.json")).unwrap();

        let invalid = UserSettings {
            track_extensions: vec![],
            ..UserSettings::default()
        };
        assert!(manager.update_settings(invalid).is_err());
        assert_eq!(*manager.get_settings(), UserSettings::default());
    }
}
