//! Named directory with its last-modified timestamp.

use std::{
    cmp::Ordering,
    fs::{Metadata, read_dir},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::{error::domain::LibraryError, library::entry::cmp_names};

/// A directory (or file) found while listing a local directory.
///
/// Entries order by case-insensitive name; ties fall back to the exact name
/// and then the path so that sorting stays stable.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    name: String,
    path: PathBuf,
    last_written: Option<SystemTime>,
}

impl DirectoryEntry {
    /// Creates a new entry.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        last_written: Option<SystemTime>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            last_written,
        }
    }

    /// Entry name (last path component).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time, if the filesystem reports one.
    pub fn last_written(&self) -> Option<SystemTime> {
        self.last_written
    }

    /// Orders by last modification, newest first. Entries without a
    /// timestamp go last; ties use the name ordering.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        cmp_newest(self.last_written, other.last_written).then_with(|| self.cmp(other))
    }
}

impl PartialEq for DirectoryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DirectoryEntry {}

impl PartialOrd for DirectoryEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DirectoryEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_listed_names(&self.name, &other.name).then_with(|| self.path.cmp(&other.path))
    }
}

/// Name order of listed entries: case-insensitive, exact name on ties.
pub fn cmp_listed_names(a: &str, b: &str) -> Ordering {
    cmp_names(a, b).then_with(|| a.cmp(b))
}

/// Newest timestamp first; missing timestamps go last.
pub fn cmp_newest(a: Option<SystemTime>, b: Option<SystemTime>) -> Ordering {
    b.cmp(&a)
}

/// Lists the entries of `dir` accepted by `accept`, sorted by name.
///
/// Entries whose name is not valid UTF-8 or whose metadata cannot be read
/// are skipped. Only a failure to open `dir` itself is an error.
///
/// # Errors
///
/// Returns `LibraryError::Io` if the directory cannot be read.
pub fn scan_directory<F>(dir: &Path, accept: F) -> Result<Vec<DirectoryEntry>, LibraryError>
where
    F: Fn(&str, &Metadata) -> bool,
{
    let mut entries = Vec::new();
    for entry in read_dir(dir).map_err(|e| LibraryError::io(dir, e))? {
        let Ok(entry) = entry else {
            continue;
        };
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        // Follows symlinks, so linked album folders count as directories.
        let Ok(metadata) = entry.path().metadata() else {
            continue;
        };
        if accept(&name, &metadata) {
            entries.push(DirectoryEntry::new(
                name,
                entry.path(),
                metadata.modified().ok(),
            ));
        }
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{create_dir, write},
        path::PathBuf,
        time::{Duration, SystemTime},
    };

    use tempfile::TempDir;

    use crate::library::directory_entry::{DirectoryEntry, scan_directory};

    fn entry(name: &str, secs: Option<u64>) -> DirectoryEntry {
        DirectoryEntry::new(
            name,
            PathBuf::from("/music").join(name),
            secs.map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s)),
        )
    }

    #[test]
    fn test_case_insensitive_ordering() {
        let mut entries = vec![entry("beatles", None), entry("ABBA", None), entry("Cream", None)];
        entries.sort();
        let names: Vec<_> = entries.iter().map(DirectoryEntry::name).collect();
        assert_eq!(names, ["ABBA", "beatles", "Cream"]);
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut entries = vec![
            entry("old", Some(10)),
            entry("unknown", None),
            entry("new", Some(20)),
        ];
        entries.sort_by(DirectoryEntry::cmp_newest_first);
        let names: Vec<_> = entries.iter().map(DirectoryEntry::name).collect();
        assert_eq!(names, ["new", "old", "unknown"]);
    }

    #[test]
    fn test_scan_directory_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        create_dir(temp_dir.path().join("zappa")).unwrap();
        create_dir(temp_dir.path().join("Abba")).unwrap();
        create_dir(temp_dir.path().join(".hidden")).unwrap();
        write(temp_dir.path().join("notes.txt"), b"x").unwrap();

        let entries = scan_directory(temp_dir.path(), |name, metadata| {
            metadata.is_dir() && !name.starts_with('.')
        })
        .unwrap();
        let names: Vec<_> = entries.iter().map(DirectoryEntry::name).collect();
        assert_eq!(names, ["Abba", "zappa"]);
        assert!(entries[0].last_written().is_some());
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_directory(&temp_dir.path().join("missing"), |_, _| true).is_err());
    }
}
