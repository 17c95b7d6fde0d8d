//! Album entries: an ordered set of tracks below one artist.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc, time::SystemTime};

use tracing::{debug, warn};

use crate::{
    error::domain::LibraryError,
    library::{
        directory_entry::{cmp_listed_names, cmp_newest},
        entry::{
            EntryCore, LibraryEntry, Locator, NameKey, RenameEntry, ScanState, build_index,
            nth_child, rename_child,
        },
        scanner::{ChildKind, ChildListing, ScanContext},
        track::TrackEntry,
    },
};

/// An album directory and its tracks, ordered case-insensitively by name.
#[derive(Debug)]
pub struct AlbumEntry {
    core: EntryCore,
    artist_name: String,
    tracks: BTreeMap<NameKey, TrackEntry>,
    scanned: bool,
}

impl AlbumEntry {
    pub(crate) fn new(listing: ChildListing, artist_name: &str, context: Arc<ScanContext>) -> Self {
        Self {
            core: EntryCore::new(&listing, context),
            artist_name: artist_name.to_string(),
            tracks: BTreeMap::new(),
            scanned: false,
        }
    }

    pub fn album_name(&self) -> &str {
        &self.core.name
    }

    /// Name of the artist this album belongs to.
    pub fn artist_name(&self) -> &str {
        &self.artist_name
    }

    /// Tracks in name order. Empty until scanned.
    pub fn tracks(&self) -> impl DoubleEndedIterator<Item = &TrackEntry> + ExactSizeIterator {
        self.tracks.values()
    }

    /// Track with exactly this name.
    pub fn track(&self, name: &str) -> Option<&TrackEntry> {
        self.tracks.get(&NameKey::new(name))
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Newest first, albums without a timestamp last. Ties order by album
    /// name like directory listings, then by locator.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        cmp_newest(self.last_written(), other.last_written())
            .then_with(|| cmp_listed_names(self.album_name(), other.album_name()))
            .then_with(|| self.locator().cmp(other.locator()))
    }

    pub fn scan_state(&self) -> ScanState {
        ScanState::of(self.scanned, self.tracks.len())
    }

    /// Discards the current tracks and lists them again.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the album cannot be listed; the previous
    /// tracks are kept in that case.
    pub fn rescan(&mut self) -> Result<(), LibraryError> {
        let listings = self.list_tracks()?;
        self.install(listings);
        Ok(())
    }

    /// Sum of all known track sizes. Unknown sizes count as zero.
    pub fn total_size(&self) -> u64 {
        self.tracks
            .values()
            .map(|track| track.file_size().unwrap_or(0))
            .sum()
    }

    /// Renames the track `old_name` and re-indexes it.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the track does not exist, the name is taken
    /// or the file cannot be renamed. Nothing changes on failure.
    pub fn rename_track(&mut self, old_name: &str, new_name: &str) -> Result<(), LibraryError> {
        rename_child(&mut self.tracks, "track", old_name, new_name)
    }

    fn list_tracks(&self) -> Result<Vec<ChildListing>, LibraryError> {
        self.core
            .context
            .list_children(&self.core.locator, ChildKind::Tracks)
            .inspect_err(|e| warn!(album = %self.core.locator, error = %e, "Failed to scan album"))
    }

    fn install(&mut self, listings: Vec<ChildListing>) {
        let context = &self.core.context;
        let (artist, album) = (&self.artist_name, &self.core.name);
        self.tracks = build_index(listings, |listing| {
            TrackEntry::new(listing, artist, album, context.clone())
        });
        self.scanned = true;
        debug!(album = %self.core.locator, tracks = self.tracks.len(), "Scanned album");
    }

    /// Follows a rename of the owning artist.
    pub(crate) fn reparent(&mut self, artist: &Locator, artist_name: &str) {
        self.core.relocate(artist);
        artist_name.clone_into(&mut self.artist_name);
        self.propagate();
    }

    fn propagate(&mut self) {
        for track in self.tracks.values_mut() {
            track.reparent(&self.core.locator, &self.artist_name, &self.core.name);
        }
    }
}

impl LibraryEntry for AlbumEntry {
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
        self.tracks.len()
    }

    fn child(&self, index: usize) -> Option<&dyn LibraryEntry> {
        nth_child(&self.tracks, index)
    }
}

impl RenameEntry for AlbumEntry {
    fn rename_to(&mut self, new_name: &str) -> Result<(), LibraryError> {
        if self.core.rename_backing(new_name)? {
            self.propagate();
        }
        Ok(())
    }
}
