//! Shared identity and rename plumbing for artist, album and track entries.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::rename,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::SystemTime,
};

use tracing::{error, warn};

use crate::{
    error::domain::LibraryError,
    library::scanner::{ChildListing, ScanContext},
};

/// Case-folds a name for ordering and name comparisons.
pub fn fold_name(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

/// Compares two names case-insensitively without allocating.
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Where an entry lives: a local path or an opaque remote catalog id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Locator {
    /// Entry backed by the local filesystem.
    Local(PathBuf),
    /// Entry served by a remote catalog.
    Remote(String),
}

impl Locator {
    /// Local path of the entry, if it has one.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Whether the entry is backed by the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Locator of the child called `name`. Remote children are addressed by
    /// the catalog and cannot be derived.
    pub fn child(&self, name: &str) -> Option<Locator> {
        self.as_path().map(|path| Self::Local(path.join(name)))
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(id) => write!(f, "remote:{id}"),
        }
    }
}

impl From<PathBuf> for Locator {
    fn from(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Path> for Locator {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

/// Index key of a child entry: ordered case-insensitively, exact name as the
/// tie-breaker so names differing only in case can coexist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameKey {
    folded: String,
    name: String,
}

impl NameKey {
    pub fn new(name: &str) -> Self {
        Self {
            folded: fold_name(name),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Scan state of a container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Children have not been listed yet.
    Unscanned,
    /// Listed; the backing store had no valid children.
    Empty,
    /// Listed with at least one child.
    Populated,
}

impl ScanState {
    pub(crate) fn of(scanned: bool, child_count: usize) -> Self {
        match (scanned, child_count) {
            (false, _) => Self::Unscanned,
            (true, 0) => Self::Empty,
            (true, _) => Self::Populated,
        }
    }
}

/// Common interface of artist, album and track entries.
pub trait LibraryEntry {
    /// Display name of the entry.
    fn name(&self) -> &str;

    /// Backing locator of the entry.
    fn locator(&self) -> &Locator;

    /// Last modification time of the backing resource, read on first use.
    fn last_written(&self) -> Option<SystemTime>;

    /// Whether children (or, for tracks, audio properties) are populated.
    fn is_scanned(&self) -> bool;

    /// Populates the entry from its backing store. A no-op once scanned.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the backing store cannot be read; the entry
    /// stays unscanned and the call can be retried.
    fn scan(&mut self) -> Result<(), LibraryError>;

    /// Number of direct children.
    fn child_count(&self) -> usize;

    /// Child at `index` in name order, `None` past the end.
    fn child(&self, index: usize) -> Option<&dyn LibraryEntry>;
}

/// Rename hook used by parents to keep their index in sync.
pub(crate) trait RenameEntry: LibraryEntry {
    /// Renames the backing resource and propagates the new locator to all
    /// descendants.
    fn rename_to(&mut self, new_name: &str) -> Result<(), LibraryError>;
}

/// Identity shared by every entry kind.
#[derive(Debug)]
pub(crate) struct EntryCore {
    pub(crate) name: String,
    pub(crate) locator: Locator,
    last_written: OnceLock<Option<SystemTime>>,
    pub(crate) context: Arc<ScanContext>,
}

impl EntryCore {
    pub(crate) fn new(listing: &ChildListing, context: Arc<ScanContext>) -> Self {
        let last_written = OnceLock::new();
        if let Some(time) = listing.last_written {
            let _ = last_written.set(Some(time));
        }
        Self {
            name: listing.name.clone(),
            locator: listing.locator.clone(),
            last_written,
            context,
        }
    }

    pub(crate) fn last_written(&self) -> Option<SystemTime> {
        *self.last_written.get_or_init(|| {
            self.locator
                .as_path()
                .and_then(|path| path.metadata().and_then(|m| m.modified()).ok())
        })
    }

    /// Renames the backing resource. Returns `false` when `new_name` equals
    /// the current name and nothing was done.
    pub(crate) fn rename_backing(&mut self, new_name: &str) -> Result<bool, LibraryError> {
        let Locator::Local(path) = &self.locator else {
            return Err(LibraryError::NotLocal {
                locator: self.locator.to_string(),
            });
        };
        validate_name(new_name)?;
        if new_name == self.name {
            return Ok(false);
        }

        let target = path.with_file_name(new_name);
        // A case-only rename targets the same file on case-insensitive filesystems.
        if target.exists() && cmp_names(new_name, &self.name) != Ordering::Equal {
            return Err(LibraryError::AlreadyExists {
                name: new_name.to_string(),
            });
        }
        if let Err(e) = rename(path, &target) {
            warn!(from = %path.display(), to = %target.display(), error = %e, "Rename failed");
            return Err(LibraryError::io(path.clone(), e));
        }

        self.name = new_name.to_string();
        self.locator = Locator::Local(target);
        self.last_written = OnceLock::new();
        Ok(true)
    }

    /// Moves the entry below `parent`, keeping its name.
    pub(crate) fn relocate(&mut self, parent: &Locator) {
        if let Some(locator) = parent.child(&self.name) {
            self.locator = locator;
        }
    }
}

fn validate_name(name: &str) -> Result<(), LibraryError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(LibraryError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Builds a child index from a raw listing.
pub(crate) fn build_index<T>(
    listings: Vec<ChildListing>,
    mut make: impl FnMut(ChildListing) -> T,
) -> BTreeMap<NameKey, T> {
    listings
        .into_iter()
        .map(|listing| (NameKey::new(&listing.name), make(listing)))
        .collect()
}

/// Renames the child `old_name` of `index` to `new_name` and re-keys it.
///
/// The index is untouched when the rename fails.
pub(crate) fn rename_child<T: RenameEntry>(
    index: &mut BTreeMap<NameKey, T>,
    entity: &str,
    old_name: &str,
    new_name: &str,
) -> Result<(), LibraryError> {
    let old_key = NameKey::new(old_name);
    let Some(child) = index.get(&old_key) else {
        return Err(LibraryError::not_found(entity, old_name));
    };
    if child.name() != old_name {
        let reason = format!(
            "{entity} indexed as {old_name:?} is named {:?}",
            child.name()
        );
        error!("{reason}");
        debug_assert!(false, "{reason}");
        return Err(LibraryError::IndexInvariant { reason });
    }
    if new_name == old_name {
        return Ok(());
    }
    let new_key = NameKey::new(new_name);
    if index.contains_key(&new_key) {
        return Err(LibraryError::AlreadyExists {
            name: new_name.to_string(),
        });
    }

    let Some(mut child) = index.remove(&old_key) else {
        return Err(LibraryError::not_found(entity, old_name));
    };
    match child.rename_to(new_name) {
        Ok(()) => {
            index.insert(new_key, child);
            Ok(())
        }
        Err(e) => {
            index.insert(old_key, child);
            Err(e)
        }
    }
}

/// Positional access into an ordered child index.
pub(crate) fn nth_child<T: LibraryEntry>(
    index: &BTreeMap<NameKey, T>,
    position: usize,
) -> Option<&dyn LibraryEntry> {
    index
        .values()
        .nth(position)
        .map(|child| child as &dyn LibraryEntry)
}

#[cfg(test)]
mod tests {
    use std::{cmp::Ordering, path::PathBuf};

    use crate::library::entry::{Locator, NameKey, ScanState, cmp_names, fold_name};

    #[test]
    fn test_fold_and_compare_names() {
        assert_eq!(fold_name("Back In Black [HD]"), "back in black [hd]");
        assert_eq!(cmp_names("AC-DC", "ac-dc"), Ordering::Equal);
        assert_eq!(cmp_names("abba", "Beatles"), Ordering::Less);
    }

    #[test]
    fn test_name_key_order() {
        let mut keys = vec![NameKey::new("b"), NameKey::new("A"), NameKey::new("a")];
        keys.sort();
        let names: Vec<_> = keys.iter().map(NameKey::name).collect();
        assert_eq!(names, ["A", "a", "b"]);
    }

    #[test]
    fn test_locator_children() {
        let local = Locator::Local(PathBuf::from("/music"));
        assert_eq!(
            local.child("ac-dc"),
            Some(Locator::Local(PathBuf::from("/music/ac-dc")))
        );
        assert_eq!(Locator::Remote("42".to_string()).child("x"), None);
        assert_eq!(Locator::Remote("42".to_string()).to_string(), "remote:42");
    }

    #[test]
    fn test_scan_state_is_tri_state() {
        assert_eq!(ScanState::of(false, 0), ScanState::Unscanned);
        assert_eq!(ScanState::of(true, 0), ScanState::Empty);
        assert_eq!(ScanState::of(true, 3), ScanState::Populated);
    }
}
