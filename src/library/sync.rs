//! Turns a library comparison into file operations bringing a secondary
//! (e.g. mobile) library in line with the primary one.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{copy, create_dir_all, remove_dir_all, remove_file, rename},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::UserSettings,
    error::domain::LibraryError,
    library::{
        cancel::CancelToken,
        compare::LibraryComparison,
        entry::{LibraryEntry, Locator, cmp_names},
        root::MusicLibrary,
        track::TrackEntry,
    },
};

/// Which differences a sync resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete artists, albums and tracks that only exist in the secondary
    /// library.
    pub remove_additional: bool,
    /// Overwrite secondary tracks whose size differs from the primary copy.
    pub replace_different: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remove_additional: false,
            replace_different: true,
        }
    }
}

impl From<&UserSettings> for SyncOptions {
    fn from(settings: &UserSettings) -> Self {
        Self {
            remove_additional: settings.sync_remove_additional,
            replace_different: settings.sync_check_file_size,
        }
    }
}

/// A single file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy `source` to `target`, replacing an existing file.
    Copy { source: PathBuf, target: PathBuf },
    /// Delete the file or directory tree at `target`.
    Remove { target: PathBuf },
}

impl SyncAction {
    pub fn target(&self) -> &Path {
        match self {
            Self::Copy { target, .. } | Self::Remove { target } => target,
        }
    }
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Copy { source, target } => {
                write!(f, "copy {} -> {}", source.display(), target.display())
            }
            Self::Remove { target } => write!(f, "remove {}", target.display()),
        }
    }
}

/// Progress of a running sync, reported after every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub processed: usize,
    pub total: usize,
}

/// Outcome of [`SyncPlan::execute`].
#[derive(Debug, Default)]
pub struct SyncReport {
    pub completed: usize,
    pub failed: Vec<(SyncAction, LibraryError)>,
    /// Actions not attempted because the run was cancelled, or removals whose
    /// target was already gone.
    pub skipped: usize,
    pub interrupted: bool,
}

impl SyncReport {
    /// Whether every action was applied.
    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.failed.is_empty()
    }
}

/// Ordered file operations: copies first, then removals.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    actions: Vec<SyncAction>,
}

fn local_path(locator: &Locator) -> Result<&Path, LibraryError> {
    locator.as_path().ok_or_else(|| LibraryError::NotLocal {
        locator: locator.to_string(),
    })
}

/// Finds `name` among `entries`, preferring the exact spelling over one that
/// differs only in case.
fn find_named<'a, T: LibraryEntry + 'a>(
    entries: impl Iterator<Item = &'a T>,
    name: &str,
) -> Option<&'a T> {
    let mut folded_match = None;
    for entry in entries {
        if entry.name() == name {
            return Some(entry);
        }
        if folded_match.is_none() && cmp_names(entry.name(), name) == Ordering::Equal {
            folded_match = Some(entry);
        }
    }
    folded_match
}

/// Resolves directories of the secondary library, reusing the existing
/// spelling of artist and album names where they exist.
struct TargetResolver<'a> {
    secondary: &'a MusicLibrary,
    root: &'a Path,
}

impl TargetResolver<'_> {
    fn artist_dir(&self, artist: &str) -> PathBuf {
        find_named(self.secondary.artists(), artist)
            .and_then(|entry| entry.locator().as_path())
            .map_or_else(|| self.root.join(artist), Path::to_path_buf)
    }

    fn album_dir(&self, artist: &str, album: &str) -> PathBuf {
        find_named(self.secondary.artists(), artist)
            .and_then(|entry| find_named(entry.albums(), album))
            .and_then(|entry| entry.locator().as_path())
            .map_or_else(|| self.artist_dir(artist).join(album), Path::to_path_buf)
    }

    fn track_target(&self, track: &TrackEntry) -> PathBuf {
        self.album_dir(track.artist_name(), track.album_name())
            .join(track.track_name())
    }
}

impl SyncPlan {
    /// Builds the plan resolving `comparison` of `primary` against
    /// `secondary`. Whole missing artists and albums are expanded into copies
    /// of their scanned tracks.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NotLocal` if either library or any involved
    /// entry is not on the local filesystem.
    pub fn from_comparison(
        primary: &MusicLibrary,
        secondary: &MusicLibrary,
        comparison: &LibraryComparison<'_>,
        options: &SyncOptions,
    ) -> Result<Self, LibraryError> {
        local_path(primary.root())?;
        let resolver = TargetResolver {
            secondary,
            root: local_path(secondary.root())?,
        };
        let mut copies = Vec::new();
        let mut copy_track = |track: &TrackEntry| -> Result<(), LibraryError> {
            copies.push(SyncAction::Copy {
                source: local_path(track.locator())?.to_path_buf(),
                target: resolver.track_target(track),
            });
            Ok(())
        };

        let missing_albums = comparison
            .missing_artists
            .iter()
            .flat_map(|artist| artist.albums())
            .chain(comparison.missing_albums.iter().copied());
        for album in missing_albums {
            album.tracks().try_for_each(&mut copy_track)?;
        }
        comparison
            .missing_tracks
            .iter()
            .copied()
            .try_for_each(&mut copy_track)?;
        if options.replace_different {
            for (source, target) in &comparison.different_tracks {
                copies.push(SyncAction::Copy {
                    source: local_path(source.locator())?.to_path_buf(),
                    target: local_path(target.locator())?.to_path_buf(),
                });
            }
        }

        let mut actions = copies;
        if options.remove_additional {
            let artists = comparison.additional_artists.iter().map(|e| e.locator());
            let albums = comparison.additional_albums.iter().map(|e| e.locator());
            let tracks = comparison.additional_tracks.iter().map(|e| e.locator());
            for locator in artists.chain(albums).chain(tracks) {
                actions.push(SyncAction::Remove {
                    target: local_path(locator)?.to_path_buf(),
                });
            }
        }
        debug!(actions = actions.len(), ?options, "Built sync plan");
        Ok(Self { actions })
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Applies the plan. Cancellation is honored between actions only; a
    /// copy is written to a hidden `.part` file and renamed into place, so an
    /// interrupted run never leaves a truncated track under its final name.
    ///
    /// Failed actions are recorded and the run continues. Both libraries
    /// should be rescanned afterwards.
    pub fn execute(
        &self,
        cancel: &CancelToken,
        mut progress: impl FnMut(SyncProgress),
    ) -> SyncReport {
        let total = self.actions.len();
        let mut report = SyncReport::default();
        for (index, action) in self.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                report.interrupted = true;
                report.skipped += total - index;
                info!(processed = index, total, "Sync cancelled");
                break;
            }
            match apply(action) {
                Ok(true) => report.completed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(%action, error = %e, "Sync action failed");
                    report.failed.push((action.clone(), e));
                }
            }
            progress(SyncProgress {
                processed: index + 1,
                total,
            });
        }
        info!(
            completed = report.completed,
            failed = report.failed.len(),
            skipped = report.skipped,
            "Sync finished"
        );
        report
    }
}

/// Returns `false` when there was nothing to do.
fn apply(action: &SyncAction) -> Result<bool, LibraryError> {
    match action {
        SyncAction::Copy { source, target } => {
            copy_atomically(source, target)?;
            Ok(true)
        }
        SyncAction::Remove { target } => {
            let result = if target.is_dir() {
                remove_dir_all(target)
            } else {
                remove_file(target)
            };
            match result {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(LibraryError::io(target.clone(), e)),
            }
        }
    }
}

fn copy_atomically(source: &Path, target: &Path) -> Result<(), LibraryError> {
    let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
        return Err(LibraryError::InvalidName {
            name: target.display().to_string(),
        });
    };
    create_dir_all(dir).map_err(|e| LibraryError::io(dir.to_path_buf(), e))?;

    let partial = dir.join(format!(".{}.part", name.to_string_lossy()));
    let result = copy(source, &partial)
        .map_err(|e| LibraryError::io(source.to_path_buf(), e))
        .and_then(|_| rename(&partial, target).map_err(|e| LibraryError::io(partial.clone(), e)));
    if result.is_err() {
        let _ = remove_file(&partial);
    }
    result
}
