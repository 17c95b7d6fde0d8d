//! Collaborators consumed while scanning: directory listings (local or from
//! a remote catalog) and audio property reading.

use std::{fmt::Debug, sync::Arc, time::SystemTime};

use tracing::debug;

use crate::{
    audio::metadata::{LoftyReader, MetadataReader},
    error::domain::LibraryError,
    library::{
        directory_entry::scan_directory,
        entry::{Locator, cmp_names},
        scanner::ScannerConfig,
    },
};

/// Level of the children being listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Artists,
    Albums,
    Tracks,
}

/// One child found by a listing, before it is wrapped into a typed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildListing {
    pub name: String,
    pub locator: Locator,
    pub last_written: Option<SystemTime>,
    /// Known up front for remote tracks only.
    pub file_size: Option<u64>,
    /// Known up front for remote tracks only.
    pub length_ms: Option<u64>,
}

/// Item reported by a [`RemoteCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub name: String,
    /// Catalog id of the item, used as its remote locator.
    pub id: String,
    pub file_size: Option<u64>,
    pub length_ms: Option<u64>,
}

/// Remote catalog serving artists, albums and tracks that are not on the
/// local filesystem.
pub trait RemoteCatalog: Debug + Send + Sync {
    /// Lists the children of the item `id`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the catalog cannot be queried.
    fn list(&self, id: &str, kind: ChildKind) -> Result<Vec<CatalogItem>, LibraryError>;

    /// Returns `(sample_rate, bits_per_sample)` of the track `id`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the catalog cannot be queried.
    fn track_format(&self, id: &str) -> Result<(u32, u32), LibraryError>;
}

/// Everything an entry needs to scan itself.
///
/// Explicitly constructed and shared through `Arc`, so tests can substitute
/// fake readers and catalogs.
#[derive(Debug)]
pub struct ScanContext {
    config: ScannerConfig,
    metadata: Arc<dyn MetadataReader>,
    catalog: Option<Arc<dyn RemoteCatalog>>,
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new(ScannerConfig::default(), Arc::new(LoftyReader))
    }
}

impl ScanContext {
    /// Creates a context without a remote catalog.
    pub fn new(config: ScannerConfig, metadata: Arc<dyn MetadataReader>) -> Self {
        Self {
            config,
            metadata,
            catalog: None,
        }
    }

    /// Adds a remote catalog for `Locator::Remote` entries.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn RemoteCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn metadata(&self) -> &dyn MetadataReader {
        self.metadata.as_ref()
    }

    /// Catalog serving the remote item `id`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NoCatalog` if no catalog is configured.
    pub fn catalog(&self, id: &str) -> Result<&dyn RemoteCatalog, LibraryError> {
        self.catalog
            .as_deref()
            .ok_or_else(|| LibraryError::NoCatalog {
                locator: id.to_string(),
            })
    }

    /// Lists the valid children of `locator`, sorted by name.
    ///
    /// Artist and album levels accept directories, the track level accepts
    /// files with an allowed extension. Dot-entries are skipped unless hidden
    /// entries are enabled.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the backing store cannot be listed.
    pub fn list_children(
        &self,
        locator: &Locator,
        kind: ChildKind,
    ) -> Result<Vec<ChildListing>, LibraryError> {
        let listings = match locator {
            Locator::Local(path) => {
                let entries = scan_directory(path, |name, metadata| match kind {
                    ChildKind::Artists | ChildKind::Albums => {
                        metadata.is_dir() && self.config.is_visible(name)
                    }
                    ChildKind::Tracks => metadata.is_file() && self.config.is_track_file(name),
                })?;
                entries
                    .into_iter()
                    .map(|entry| ChildListing {
                        name: entry.name().to_string(),
                        locator: Locator::Local(entry.path().to_path_buf()),
                        last_written: entry.last_written(),
                        file_size: None,
                        length_ms: None,
                    })
                    .collect::<Vec<_>>()
            }
            Locator::Remote(id) => {
                let mut items = self.catalog(id)?.list(id, kind)?;
                items.sort_by(|a, b| {
                    cmp_names(&a.name, &b.name).then_with(|| a.name.cmp(&b.name))
                });
                items
                    .into_iter()
                    .map(|item| ChildListing {
                        name: item.name,
                        locator: Locator::Remote(item.id),
                        last_written: None,
                        file_size: item.file_size,
                        length_ms: item.length_ms,
                    })
                    .collect()
            }
        };
        debug!(%locator, ?kind, count = listings.len(), "Listed children");
        Ok(listings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        fmt::{Debug, Formatter, Result as FmtResult},
        fs::{create_dir_all, write},
        path::Path,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering::SeqCst},
        },
    };

    use {parking_lot::Mutex, tempfile::TempDir};

    use crate::{
        audio::metadata::{AudioProperties, MetadataError, MetadataReader},
        error::domain::LibraryError,
        library::{
            entry::Locator,
            scanner::{CatalogItem, ChildKind, RemoteCatalog, ScanContext, ScannerConfig},
        },
    };

    /// Metadata reader returning fixed properties and counting reads.
    #[derive(Debug, Default)]
    pub(crate) struct FakeReader {
        pub reads: AtomicUsize,
    }

    impl MetadataReader for FakeReader {
        fn read_properties(&self, path: &Path) -> Result<AudioProperties, MetadataError> {
            self.reads.fetch_add(1, SeqCst);
            if path.extension().is_some_and(|ext| ext == "mp3") {
                return Err(MetadataError::NoAudioProperties {
                    path: path.display().to_string(),
                });
            }
            Ok(AudioProperties {
                length_ms: 180_000,
                bitrate: 1411,
                sample_rate: 44_100,
                bits_per_sample: 16,
            })
        }
    }

    /// In-memory catalog keyed by item id.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub children: Mutex<HashMap<String, Vec<CatalogItem>>>,
        pub format_queries: AtomicUsize,
    }

    impl Debug for FakeCatalog {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            f.debug_struct("FakeCatalog").finish_non_exhaustive()
        }
    }

    impl FakeCatalog {
        pub(crate) fn add(&self, parent: &str, name: &str, id: &str, size: Option<u64>) {
            self.children
                .lock()
                .entry(parent.to_string())
                .or_default()
                .push(CatalogItem {
                    name: name.to_string(),
                    id: id.to_string(),
                    file_size: size,
                    length_ms: size.map(|_| 240_000),
                });
        }
    }

    impl RemoteCatalog for FakeCatalog {
        fn list(&self, id: &str, _kind: ChildKind) -> Result<Vec<CatalogItem>, LibraryError> {
            self.children
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| LibraryError::catalog(format!("unknown id {id}")))
        }

        fn track_format(&self, _id: &str) -> Result<(u32, u32), LibraryError> {
            self.format_queries.fetch_add(1, SeqCst);
            Ok((96_000, 24))
        }
    }

    /// Context with a counting fake reader.
    pub(crate) fn fake_context() -> (Arc<ScanContext>, Arc<FakeReader>) {
        let reader = Arc::new(FakeReader::default());
        let context = ScanContext::new(ScannerConfig::default(), reader.clone());
        (Arc::new(context), reader)
    }

    /// Writes `artist/album/track` files below `root`, each track holding
    /// `size` bytes.
    pub(crate) fn write_fixture(root: &Path, tracks: &[(&str, &str, &str, usize)]) {
        for (artist, album, track, size) in tracks {
            let dir = root.join(artist).join(album);
            create_dir_all(&dir).unwrap();
            write(dir.join(track), vec![0u8; *size]).unwrap();
        }
    }

    #[test]
    fn test_local_listing_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(
            temp_dir.path(),
            &[("ac-dc", "back in black [hd]", "01 - hells bells.flac", 10)],
        );
        let album_dir = temp_dir.path().join("ac-dc").join("back in black [hd]");
        write(album_dir.join("cover.jpg"), b"jpg").unwrap();
        create_dir_all(album_dir.join("scans")).unwrap();

        let (context, _) = fake_context();
        let tracks = context
            .list_children(&Locator::Local(album_dir.clone()), ChildKind::Tracks)
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "01 - hells bells.flac");

        let albums = context
            .list_children(&Locator::Local(temp_dir.path().join("ac-dc")), ChildKind::Albums)
            .unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].locator, Locator::Local(album_dir));
    }

    #[test]
    fn test_remote_listing_requires_catalog() {
        let (context, _) = fake_context();
        let result =
            context.list_children(&Locator::Remote("root".to_string()), ChildKind::Artists);
        assert!(matches!(result, Err(LibraryError::NoCatalog { .. })));
    }

    #[test]
    fn test_remote_listing_sorted() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add("root", "zz top", "a2", None);
        catalog.add("root", "ABBA", "a1", None);
        let context = ScanContext::new(ScannerConfig::default(), Arc::new(FakeReader::default()))
            .with_catalog(catalog);

        let artists = context
            .list_children(&Locator::Remote("root".to_string()), ChildKind::Artists)
            .unwrap();
        let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["ABBA", "zz top"]);
        assert_eq!(artists[0].locator, Locator::Remote("a1".to_string()));
    }
}
