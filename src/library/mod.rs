//! Music library tree, scanning, filtering, comparison and synchronization.
//!
//! A library is a three-level tree (artist, album, track) below one root
//! locator. Children are listed lazily from the local filesystem or a remote
//! catalog and kept sorted case-insensitively by name.

pub mod album;
pub mod artist;
pub mod cancel;
pub mod compare;
pub mod directory_entry;
pub mod entry;
pub mod filter;
pub mod root;
pub mod scanner;
pub mod snapshot;
pub mod sync;
pub mod track;

pub use {
    album::AlbumEntry,
    artist::ArtistEntry,
    cancel::CancelToken,
    compare::{EqualTracks, LibraryComparison},
    directory_entry::DirectoryEntry,
    entry::{LibraryEntry, Locator, ScanState},
    filter::{DatabaseMap, FilteredArtist, LibraryFilter},
    root::{LibraryStatistics, MusicLibrary},
    scanner::{LibraryScanner, ScanContext, ScanStatus, ScannerConfig, ScannerEvent},
    snapshot::{JsonSnapshotStore, SnapshotError, SnapshotStore, SyncSnapshot},
    sync::{SyncAction, SyncOptions, SyncPlan, SyncProgress, SyncReport},
    track::TrackEntry,
};
