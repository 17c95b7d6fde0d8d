//! The library root: every artist found below one root locator.

use std::{collections::BTreeMap, sync::Arc};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    error::domain::LibraryError,
    library::{
        album::AlbumEntry,
        artist::ArtistEntry,
        cancel::CancelToken,
        compare::{EqualTracks, LibraryComparison, compare, compare_existing},
        entry::{LibraryEntry, Locator, NameKey, ScanState, build_index, nth_child, rename_child},
        filter::{FilteredArtist, LibraryFilter, filter_library},
        scanner::{ChildKind, ScanContext},
    },
};

/// Counts and size of a scanned library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryStatistics {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    /// Sum of known track sizes in bytes.
    pub total_size: u64,
}

/// Root of a music library tree.
#[derive(Debug)]
pub struct MusicLibrary {
    root: Locator,
    context: Arc<ScanContext>,
    artists: BTreeMap<NameKey, ArtistEntry>,
    scanned: bool,
}

impl MusicLibrary {
    /// Creates an unscanned library rooted at `root`.
    pub fn new(root: impl Into<Locator>, context: Arc<ScanContext>) -> Self {
        Self {
            root: root.into(),
            context,
            artists: BTreeMap::new(),
            scanned: false,
        }
    }

    pub fn root(&self) -> &Locator {
        &self.root
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.context
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    pub fn scan_state(&self) -> ScanState {
        ScanState::of(self.scanned, self.artists.len())
    }

    /// Lists the artists below the root. A no-op once scanned.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the root cannot be listed.
    pub fn scan(&mut self) -> Result<(), LibraryError> {
        if self.scanned {
            return Ok(());
        }
        self.rescan()
    }

    /// Discards all artists and lists them again.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the root cannot be listed; the previous tree
    /// is kept in that case.
    pub fn rescan(&mut self) -> Result<(), LibraryError> {
        let listings = self
            .context
            .list_children(&self.root, ChildKind::Artists)
            .inspect_err(|e| warn!(root = %self.root, error = %e, "Failed to scan library root"))?;
        let context = &self.context;
        self.artists = build_index(listings, |listing| ArtistEntry::new(listing, context.clone()));
        self.scanned = true;
        debug!(root = %self.root, artists = self.artists.len(), "Scanned library root");
        Ok(())
    }

    /// Scans the whole tree down to the tracks. Track audio properties stay
    /// lazy. Artists and albums that fail to list are logged and left
    /// unscanned; only a failing root is an error.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Cancelled` when `cancel` fires between two
    /// entries, or the error of listing the root.
    pub fn scan_all(&mut self, cancel: &CancelToken) -> Result<(), LibraryError> {
        cancel.check()?;
        self.scan()?;
        for artist in self.artists.values_mut() {
            cancel.check()?;
            match artist.scan_all(cancel) {
                Err(LibraryError::Cancelled) => return Err(LibraryError::Cancelled),
                Err(_) | Ok(()) => {}
            }
        }
        info!(root = %self.root, statistics = ?self.statistics(), "Library scan finished");
        Ok(())
    }

    /// Artists in name order.
    pub fn artists(&self) -> impl DoubleEndedIterator<Item = &ArtistEntry> + ExactSizeIterator {
        self.artists.values()
    }

    /// Artist with exactly this name.
    pub fn artist(&self, name: &str) -> Option<&ArtistEntry> {
        self.artists.get(&NameKey::new(name))
    }

    pub fn artist_mut(&mut self, name: &str) -> Option<&mut ArtistEntry> {
        self.artists.get_mut(&NameKey::new(name))
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    /// Renames the artist `old_name` and re-indexes it.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the artist does not exist, the name is taken
    /// or the directory cannot be renamed. Nothing changes on failure.
    pub fn rename_artist(&mut self, old_name: &str, new_name: &str) -> Result<(), LibraryError> {
        rename_child(&mut self.artists, "artist", old_name, new_name)
    }

    /// Moves the library to a new root locator after its directory was moved
    /// externally, keeping the scanned tree.
    pub fn relocate(&mut self, root: impl Into<Locator>) {
        self.root = root.into();
        for artist in self.artists.values_mut() {
            artist.reparent(&self.root);
        }
    }

    pub fn total_size(&self) -> u64 {
        self.artists.values().map(ArtistEntry::total_size).sum()
    }

    pub fn statistics(&self) -> LibraryStatistics {
        LibraryStatistics {
            artists: self.artists.len(),
            albums: self.artists.values().map(ArtistEntry::album_count).sum(),
            tracks: self.artists.values().map(ArtistEntry::track_count).sum(),
            total_size: self.total_size(),
        }
    }

    /// All albums of the library, most recently written first.
    pub fn albums_by_last_written(&self) -> Vec<&AlbumEntry> {
        let mut albums: Vec<_> = self.artists.values().flat_map(ArtistEntry::albums).collect();
        albums.sort_by(|a, b| a.cmp_newest_first(b));
        albums
    }

    /// Artists and albums that pass `filter`, in library order.
    pub fn filtered<'a>(&'a self, filter: &LibraryFilter) -> Vec<FilteredArtist<'a>> {
        filter_library(self, filter)
    }

    /// Full structural difference against `other`.
    pub fn compare<'a>(&'a self, other: &'a MusicLibrary) -> LibraryComparison<'a> {
        compare(self, other)
    }

    /// Tracks of this library that have an equal counterpart in `other`.
    pub fn compare_existing<'a>(&'a self, other: &MusicLibrary) -> EqualTracks<'a> {
        compare_existing(self, other)
    }
}

impl LibraryEntry for MusicLibrary {
    fn name(&self) -> &str {
        ""
    }

    fn locator(&self) -> &Locator {
        &self.root
    }

    fn last_written(&self) -> Option<std::time::SystemTime> {
        self.root
            .as_path()
            .and_then(|path| path.metadata().and_then(|m| m.modified()).ok())
    }

    fn is_scanned(&self) -> bool {
        self.scanned
    }

    fn scan(&mut self) -> Result<(), LibraryError> {
        MusicLibrary::scan(self)
    }

    fn child_count(&self) -> usize {
        self.artists.len()
    }

    fn child(&self, index: usize) -> Option<&dyn LibraryEntry> {
        nth_child(&self.artists, index)
    }
}
