//! Records of tracks already present on a synchronized copy.
//!
//! A snapshot maps artist -> album -> track names and remembers when each
//! album was first recorded, so a filter can later show "albums synced
//! before a given time" or their complement.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fs::{create_dir_all, read_to_string, rename, write},
    io::Error as StdError,
    path::{Path, PathBuf},
    time::SystemTime,
};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

use crate::{
    config::get_cache_dir,
    library::{compare::EqualTracks, filter::DatabaseMap},
};

/// Error type for snapshot persistence.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] StdError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSnapshot {
    pub recorded_at: SystemTime,
    pub tracks: BTreeSet<String>,
}

/// Tracks known to exist on a synchronized copy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub artists: BTreeMap<String, BTreeMap<String, AlbumSnapshot>>,
}

impl SyncSnapshot {
    /// Adds the tracks of an existence-only comparison. Albums already
    /// recorded keep their original timestamp.
    pub fn record(&mut self, equal: &EqualTracks<'_>, at: SystemTime) {
        for (artist, albums) in equal {
            let recorded = self.artists.entry(artist.clone()).or_default();
            for (album, tracks) in albums {
                let snapshot = recorded.entry(album.clone()).or_insert_with(|| AlbumSnapshot {
                    recorded_at: at,
                    tracks: BTreeSet::new(),
                });
                snapshot.recorded_at = snapshot.recorded_at.min(at);
                snapshot
                    .tracks
                    .extend(tracks.iter().map(|track| track.track_name().to_string()));
            }
        }
    }

    /// Artist -> albums map for [`LibraryFilter::set_database_match`], limited
    /// to albums recorded at or before `before` when given.
    ///
    /// [`LibraryFilter::set_database_match`]: crate::library::filter::LibraryFilter::set_database_match
    pub fn database_map(&self, before: Option<SystemTime>) -> DatabaseMap {
        self.artists
            .iter()
            .filter_map(|(artist, albums)| {
                let albums: HashSet<_> = albums
                    .iter()
                    .filter(|(_, album)| before.is_none_or(|limit| album.recorded_at <= limit))
                    .map(|(name, _)| name.clone())
                    .collect();
                (!albums.is_empty()).then(|| (artist.clone(), albums))
            })
            .collect()
    }

    pub fn contains_track(&self, artist: &str, album: &str, track: &str) -> bool {
        self.artists
            .get(artist)
            .and_then(|albums| albums.get(album))
            .is_some_and(|album| album.tracks.contains(track))
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

/// Persistence of sync snapshots.
pub trait SnapshotStore {
    /// Loads the stored snapshot, or an empty one if none was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the store cannot be read or parsed.
    fn load(&self) -> Result<SyncSnapshot, SnapshotError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the store cannot be written.
    fn save(&self, snapshot: &SyncSnapshot) -> Result<(), SnapshotError>;
}

/// Snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store named `name` in the application cache directory, one per
    /// synchronized copy.
    pub fn in_cache_dir(name: &str) -> Self {
        Self::new(get_cache_dir().join(format!("{name}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<SyncSnapshot, SnapshotError> {
        if !self.path.exists() {
            debug!("No sync snapshot at {:?}", self.path);
            return Ok(SyncSnapshot::default());
        }
        let contents = read_to_string(&self.path)?;
        Ok(from_str(&contents)?)
    }

    fn save(&self, snapshot: &SyncSnapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        debug!("Saving sync snapshot to {:?}", self.path);
        let contents = to_string_pretty(snapshot)?;
        let partial = self.path.with_extension("json.part");
        write(&partial, contents)?;
        rename(&partial, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::write,
        time::{Duration, SystemTime},
    };

    use tempfile::TempDir;

    use crate::library::{
        root::tests::scanned_library,
        scanner::context::tests::write_fixture,
        snapshot::{JsonSnapshotStore, SnapshotError, SnapshotStore, SyncSnapshot},
    };

    #[test]
    fn test_record_and_filter_by_time() {
        let primary_dir = TempDir::new().unwrap();
        let mobile_dir = TempDir::new().unwrap();
        let tracks = [
            ("ac-dc", "back in black", "01.flac", 10),
            ("ac-dc", "highway to hell", "01.flac", 10),
        ];
        write_fixture(primary_dir.path(), &tracks);
        write_fixture(mobile_dir.path(), &tracks[..1]);
        let primary = scanned_library(primary_dir.path());
        let mobile = scanned_library(mobile_dir.path());

        let early = SystemTime::now() - Duration::from_secs(3600);
        let mut snapshot = SyncSnapshot::default();
        snapshot.record(&primary.compare_existing(&mobile), early);
        assert!(snapshot.contains_track("ac-dc", "back in black", "01.flac"));
        assert!(!snapshot.contains_track("ac-dc", "highway to hell", "01.flac"));

        write_fixture(mobile_dir.path(), &tracks[1..]);
        let mobile = scanned_library(mobile_dir.path());
        let late = SystemTime::now();
        snapshot.record(&primary.compare_existing(&mobile), late);

        let all = snapshot.database_map(None);
        assert_eq!(all["ac-dc"].len(), 2);
        let before = snapshot.database_map(Some(early + Duration::from_secs(1)));
        assert!(before["ac-dc"].contains("back in black"));
        assert!(!before["ac-dc"].contains("highway to hell"));
        assert!(
            snapshot
                .database_map(Some(early - Duration::from_secs(1)))
                .is_empty()
        );
        assert_eq!(snapshot.artists["ac-dc"]["back in black"].recorded_at, early);
    }

    #[test]
    fn test_json_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(temp_dir.path().join("nested").join("mobile.json"));
        assert!(store.load().unwrap().is_empty());

        let primary_dir = TempDir::new().unwrap();
        write_fixture(primary_dir.path(), &[("a", "b", "x.flac", 1)]);
        let library = scanned_library(primary_dir.path());
        let mut snapshot = SyncSnapshot::default();
        snapshot.record(&library.compare_existing(&library), SystemTime::now());

        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);
        assert!(!store.path().with_extension("json.part").exists());
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        write(&path, "{ not json").unwrap();
        let store = JsonSnapshotStore::new(path);
        assert!(matches!(store.load(), Err(SnapshotError::Serialization(_))));
    }
}
