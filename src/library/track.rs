//! Track entries and their lazily read audio properties.

use std::{
    cmp::Ordering,
    sync::{Arc, OnceLock},
    time::SystemTime,
};

use {parking_lot::Mutex, tracing::warn};

use crate::{
    audio::metadata::AudioProperties,
    error::domain::LibraryError,
    library::{
        entry::{EntryCore, LibraryEntry, Locator, RenameEntry, cmp_names},
        scanner::{ChildListing, ScanContext},
    },
};

/// Audio property state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackScan {
    Unscanned,
    Scanned(AudioProperties),
}

/// A single audio file (or remote catalog track) inside an album.
///
/// Audio properties are read on first access and memoized. The read happens
/// under a per-track lock, so concurrent first reads from different threads
/// hit the backing store only once.
#[derive(Debug)]
pub struct TrackEntry {
    core: EntryCore,
    artist_name: String,
    album_name: String,
    file_size: OnceLock<Option<u64>>,
    /// Length reported by a remote catalog when the track was listed.
    listed_length_ms: Option<u64>,
    scan: Mutex<TrackScan>,
}

impl TrackEntry {
    pub(crate) fn new(
        listing: ChildListing,
        artist_name: &str,
        album_name: &str,
        context: Arc<ScanContext>,
    ) -> Self {
        let file_size = OnceLock::new();
        if let Some(size) = listing.file_size {
            let _ = file_size.set(Some(size));
        }
        Self {
            core: EntryCore::new(&listing, context),
            artist_name: artist_name.to_string(),
            album_name: album_name.to_string(),
            file_size,
            listed_length_ms: listing.length_ms,
            scan: Mutex::new(TrackScan::Unscanned),
        }
    }

    pub fn track_name(&self) -> &str {
        &self.core.name
    }

    pub fn artist_name(&self) -> &str {
        &self.artist_name
    }

    pub fn album_name(&self) -> &str {
        &self.album_name
    }

    /// File size in bytes, `None` when unknown.
    pub fn file_size(&self) -> Option<u64> {
        *self.file_size.get_or_init(|| {
            let path = self.core.locator.as_path()?;
            match path.metadata() {
                Ok(metadata) => Some(metadata.len()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read track size");
                    None
                }
            }
        })
    }

    /// Audio properties, read on first call. `None` if they cannot be read;
    /// the next call retries.
    pub fn properties(&self) -> Option<AudioProperties> {
        let mut scan = self.scan.lock();
        if let TrackScan::Scanned(properties) = *scan {
            return Some(properties);
        }
        match self.read_properties() {
            Ok(properties) => {
                *scan = TrackScan::Scanned(properties);
                Some(properties)
            }
            Err(e) => {
                warn!(track = %self.core.locator, error = %e, "Failed to read audio properties");
                None
            }
        }
    }

    /// Length in milliseconds.
    pub fn length_ms(&self) -> Option<u64> {
        self.listed_length_ms
            .or_else(|| self.properties().map(|p| p.length_ms))
            .filter(|length| *length > 0)
    }

    /// Bitrate in kbps.
    pub fn bitrate(&self) -> Option<u32> {
        self.properties().map(|p| p.bitrate).filter(|v| *v > 0)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> Option<u32> {
        self.properties().map(|p| p.sample_rate).filter(|v| *v > 0)
    }

    pub fn bits_per_sample(&self) -> Option<u32> {
        self.properties().map(|p| p.bits_per_sample).filter(|v| *v > 0)
    }

    /// Content equality used when comparing libraries: same artist, album and
    /// track name (case-insensitive) and, if requested, the same file size.
    /// File contents are never compared.
    pub fn equal(&self, other: &TrackEntry, check_file_size: bool) -> bool {
        cmp_names(&self.artist_name, &other.artist_name) == Ordering::Equal
            && cmp_names(&self.album_name, &other.album_name) == Ordering::Equal
            && cmp_names(self.track_name(), other.track_name()) == Ordering::Equal
            && (!check_file_size || self.file_size() == other.file_size())
    }

    fn read_properties(&self) -> Result<AudioProperties, LibraryError> {
        match &self.core.locator {
            Locator::Local(path) => Ok(self.core.context.metadata().read_properties(path)?),
            Locator::Remote(id) => {
                let (sample_rate, bits_per_sample) =
                    self.core.context.catalog(id)?.track_format(id)?;
                Ok(AudioProperties {
                    length_ms: self.listed_length_ms.unwrap_or(0),
                    bitrate: 0,
                    sample_rate,
                    bits_per_sample,
                })
            }
        }
    }

    /// Follows a rename of the containing album or artist.
    pub(crate) fn reparent(&mut self, album: &Locator, artist_name: &str, album_name: &str) {
        self.core.relocate(album);
        artist_name.clone_into(&mut self.artist_name);
        album_name.clone_into(&mut self.album_name);
    }
}

impl LibraryEntry for TrackEntry {
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
        matches!(*self.scan.lock(), TrackScan::Scanned(_))
    }

    fn scan(&mut self) -> Result<(), LibraryError> {
        if *self.scan.get_mut() == TrackScan::Unscanned {
            let properties = self.read_properties()?;
            *self.scan.get_mut() = TrackScan::Scanned(properties);
        }
        Ok(())
    }

    fn child_count(&self) -> usize {
        0
    }

    fn child(&self, _index: usize) -> Option<&dyn LibraryEntry> {
        None
    }
}

impl RenameEntry for TrackEntry {
    fn rename_to(&mut self, new_name: &str) -> Result<(), LibraryError> {
        self.core.rename_backing(new_name).map(|_| ())
    }
}
