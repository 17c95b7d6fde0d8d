//! Configuration for library scanning behavior.

use std::path::Path;

use crate::config::settings::UserSettings;

/// Configuration for library scanning behavior.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Lower-cased file extensions accepted as tracks.
    pub track_extensions: Vec<String>,
    /// Whether dot-entries are scanned.
    pub include_hidden: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::from(&UserSettings::default())
    }
}

impl From<&UserSettings> for ScannerConfig {
    fn from(settings: &UserSettings) -> Self {
        Self {
            track_extensions: settings
                .track_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            include_hidden: settings.include_hidden,
        }
    }
}

impl ScannerConfig {
    /// Whether an entry called `name` takes part in scanning at all.
    pub fn is_visible(&self, name: &str) -> bool {
        self.include_hidden || !name.starts_with('.')
    }

    /// Whether a file called `name` is accepted as a track.
    pub fn is_track_file(&self, name: &str) -> bool {
        self.is_visible(name)
            && Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    self.track_extensions
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
                })
    }
}
