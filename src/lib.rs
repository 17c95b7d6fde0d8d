//! xplay-library - music library engine
//!
//! Scans music libraries laid out as `artist/album/track` directories (or
//! served by a remote catalog) into sorted, lazily populated trees, filters
//! them for display, compares a primary library against a mobile copy and
//! synchronizes the two.

pub mod audio;
pub mod config;
pub mod error;
pub mod library;

// Re-export key types for convenience
pub use {
    audio::{AudioProperties, LoftyReader, MetadataError, MetadataReader},
    config::{SettingsManager, UserSettings},
    error::{ErrorReporter, LibraryError, ResultExt},
    library::{
        AlbumEntry, ArtistEntry, CancelToken, LibraryComparison, LibraryEntry, LibraryFilter,
        LibraryScanner, Locator, MusicLibrary, ScanContext, ScannerEvent, SyncPlan, TrackEntry,
    },
};
