//! Artist entries: an ordered, name-indexed set of albums.

use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use tracing::{debug, warn};

use crate::{
    error::domain::LibraryError,
    library::{
        album::AlbumEntry,
        cancel::CancelToken,
        entry::{
            EntryCore, LibraryEntry, Locator, NameKey, RenameEntry, ScanState, build_index,
            nth_child, rename_child,
        },
        scanner::{ChildKind, ChildListing, ScanContext},
    },
};

/// An artist directory and its albums.
///
/// Albums are kept in a single ordered map keyed case-insensitively by name,
/// which serves both in-order iteration and lookup by name.
#[derive(Debug)]
pub struct ArtistEntry {
    core: EntryCore,
    albums: BTreeMap<NameKey, AlbumEntry>,
    scanned: bool,
}

impl ArtistEntry {
    pub(crate) fn new(listing: ChildListing, context: Arc<ScanContext>) -> Self {
        Self {
            core: EntryCore::new(&listing, context),
            albums: BTreeMap::new(),
            scanned: false,
        }
    }

    pub fn artist_name(&self) -> &str {
        &self.core.name
    }

    /// Albums in name order. Empty until scanned.
    pub fn albums(&self) -> impl DoubleEndedIterator<Item = &AlbumEntry> + ExactSizeIterator {
        self.albums.values()
    }

    /// Album with exactly this name.
    pub fn album(&self, name: &str) -> Option<&AlbumEntry> {
        self.albums.get(&NameKey::new(name))
    }

    /// Mutable access, e.g. to scan a single album on demand.
    pub fn album_mut(&mut self, name: &str) -> Option<&mut AlbumEntry> {
        self.albums.get_mut(&NameKey::new(name))
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn scan_state(&self) -> ScanState {
        ScanState::of(self.scanned, self.albums.len())
    }

    /// Discards the current albums (and their tracks) and lists them again.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the artist cannot be listed; the previous
    /// albums are kept in that case.
    pub fn rescan(&mut self) -> Result<(), LibraryError> {
        let listings = self
            .core
            .context
            .list_children(&self.core.locator, ChildKind::Albums)
            .inspect_err(|e| warn!(artist = %self.core.locator, error = %e, "Failed to scan artist"))?;

        let context = &self.core.context;
        let artist = &self.core.name;
        self.albums = build_index(listings, |listing| {
            AlbumEntry::new(listing, artist, context.clone())
        });
        self.scanned = true;
        debug!(artist = %self.core.locator, albums = self.albums.len(), "Scanned artist");
        Ok(())
    }

    /// Scans this artist and every album below it. Albums that fail to scan
    /// stay unscanned; cancellation is checked before each album.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Cancelled` when `cancel` fires, or the error of
    /// the artist listing itself.
    pub fn scan_all(&mut self, cancel: &CancelToken) -> Result<(), LibraryError> {
        self.scan()?;
        for album in self.albums.values_mut() {
            cancel.check()?;
            if let Err(e) = album.scan() {
                debug!(album = album.album_name(), error = %e, "Skipping unreadable album");
            }
        }
        Ok(())
    }

    /// Sum of all known track sizes below this artist.
    pub fn total_size(&self) -> u64 {
        self.albums.values().map(AlbumEntry::total_size).sum()
    }

    /// Total number of tracks across all scanned albums.
    pub fn track_count(&self) -> usize {
        self.albums.values().map(AlbumEntry::track_count).sum()
    }

    /// Albums ordered by last modification, newest first.
    pub fn albums_by_last_written(&self) -> Vec<&AlbumEntry> {
        let mut albums: Vec<_> = self.albums.values().collect();
        albums.sort_by(|a, b| a.cmp_newest_first(b));
        albums
    }

    /// Renames the album `old_name` and re-indexes it.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the album does not exist, the name is taken
    /// or the directory cannot be renamed. Nothing changes on failure.
    pub fn rename_album(&mut self, old_name: &str, new_name: &str) -> Result<(), LibraryError> {
        rename_child(&mut self.albums, "album", old_name, new_name)
    }

    /// Follows a rename of the library root.
    pub(crate) fn reparent(&mut self, root: &Locator) {
        self.core.relocate(root);
        self.propagate();
    }

    fn propagate(&mut self) {
        for album in self.albums.values_mut() {
            album.reparent(&self.core.locator, &self.core.name);
        }
    }
}

impl LibraryEntry for ArtistEntry {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn locator(&self) -> &Locator {
        &self.core.locator
    }

    fn last_written(&self) -> Option<SystemTime> {
        self.core.last_written()
    }

    fn is_scanned(&self) -> bool {
        self.scanned
    }

    fn scan(&mut self) -> Result<(), LibraryError> {
        if self.scanned {
            return Ok(());
        }
        self.rescan()
    }

    fn child_count(&self) -> usize {
        self.albums.len()
    }

    fn child(&self, index: usize) -> Option<&dyn LibraryEntry> {
        nth_child(&self.albums, index)
    }
}

impl RenameEntry for ArtistEntry {
    fn rename_to(&mut self, new_name: &str) -> Result<(), LibraryError> {
        if self.core.rename_backing(new_name)? {
            self.propagate();
        }
        Ok(())
    }
}
