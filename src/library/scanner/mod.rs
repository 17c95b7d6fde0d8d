//! Library scan orchestration.
//!
//! The `LibraryScanner` owns the current tree of one library, rebuilds it in
//! the background whenever a new root is set and broadcasts the outcome of
//! every scan to subscribers.

use std::sync::Arc;

use {
    parking_lot::{Mutex, RwLock},
    tokio::{
        runtime::Handle,
        sync::broadcast::{Receiver as TokioReceiver, Sender, channel, error::RecvError},
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::domain::LibraryError,
    library::{
        cancel::CancelToken,
        entry::Locator,
        root::{LibraryStatistics, MusicLibrary},
    },
};

mod config;
pub(crate) mod context;

pub use {
    config::ScannerConfig,
    context::{CatalogItem, ChildKind, ChildListing, RemoteCatalog, ScanContext},
};

/// Events emitted by the library scanner.
///
/// Every scan generation emits `ScanStarted` (unless it completed
/// immediately) followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerEvent {
    /// A scan of `root` began.
    ScanStarted { generation: u64, root: Locator },
    /// The tree is populated and ready for display or comparison.
    ScanCompleted {
        generation: u64,
        statistics: LibraryStatistics,
    },
    /// The root could not be traversed; the library has no tree.
    ScanFailed { generation: u64, reason: String },
    /// The scan was superseded by a newer `set_locator` call.
    ScanDiscarded { generation: u64 },
}

impl ScannerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::ScanStarted { generation, .. }
            | Self::ScanCompleted { generation, .. }
            | Self::ScanFailed { generation, .. }
            | Self::ScanDiscarded { generation } => *generation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ScanStarted { .. })
    }
}

/// Lifecycle of the scanned library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// No root was ever set.
    Idle,
    Scanning,
    Ready,
    Error,
}

#[derive(Debug)]
struct ScanSlot {
    status: ScanStatus,
    generation: u64,
    root: Option<Locator>,
    cancel: CancelToken,
}

/// State shared with background scan tasks.
///
/// Lock order: `library` before `slot`.
#[derive(Debug)]
struct Shared {
    context: Arc<ScanContext>,
    slot: Mutex<ScanSlot>,
    library: RwLock<Option<MusicLibrary>>,
    event_sender: Sender<ScannerEvent>,
}

impl Shared {
    fn run_scan(&self, generation: u64, root: Locator, cancel: &CancelToken) {
        debug!(generation, %root, "Scanning library");
        let mut library = MusicLibrary::new(root, self.context.clone());
        let result = library.scan_all(cancel);
        self.finish(generation, library, result);
    }

    fn finish(&self, generation: u64, library: MusicLibrary, result: Result<(), LibraryError>) {
        let mut tree = self.library.write();
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            debug!(generation, current = slot.generation, "Dropping superseded scan");
            return;
        }
        let event = match result {
            Ok(()) => {
                let statistics = library.statistics();
                *tree = Some(library);
                slot.status = ScanStatus::Ready;
                info!(generation, ?statistics, "Library ready");
                ScannerEvent::ScanCompleted {
                    generation,
                    statistics,
                }
            }
            Err(e) => {
                slot.status = ScanStatus::Error;
                warn!(generation, root = %library.root(), error = %e, "Library scan failed");
                ScannerEvent::ScanFailed {
                    generation,
                    reason: e.to_string(),
                }
            }
        };
        let _ = self.event_sender.send(event);
    }
}

/// Background scanner of one library root.
///
/// Cloning yields another handle to the same library.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    shared: Arc<Shared>,
}

impl LibraryScanner {
    /// Creates an idle scanner building trees with `context`.
    pub fn new(context: Arc<ScanContext>) -> Self {
        let (event_sender, _) = channel(16);
        Self {
            shared: Arc::new(Shared {
                context,
                slot: Mutex::new(ScanSlot {
                    status: ScanStatus::Idle,
                    generation: 0,
                    root: None,
                    cancel: CancelToken::new(),
                }),
                library: RwLock::new(None),
                event_sender,
            }),
        }
    }

    /// Points the library at `root` and rebuilds its tree.
    ///
    /// The previous tree is discarded right away and an in-flight scan is
    /// cancelled and reported as `ScanDiscarded`. Setting the current root
    /// of a ready library again without `force_rescan` keeps the tree and
    /// completes immediately.
    ///
    /// Inside a tokio runtime the scan runs on the blocking pool; otherwise
    /// it runs before this call returns. Returns the generation of the scan.
    pub fn set_locator(&self, root: impl Into<Locator>, force_rescan: bool) -> u64 {
        let root = root.into();
        let shared = &self.shared;
        let mut tree = shared.library.write();
        let mut slot = shared.slot.lock();

        if !force_rescan && slot.status == ScanStatus::Ready && slot.root.as_ref() == Some(&root) {
            slot.generation += 1;
            let generation = slot.generation;
            let statistics = tree
                .as_ref()
                .map(MusicLibrary::statistics)
                .unwrap_or_default();
            debug!(generation, %root, "Library already scanned");
            let _ = shared.event_sender.send(ScannerEvent::ScanCompleted {
                generation,
                statistics,
            });
            return generation;
        }

        if slot.status == ScanStatus::Scanning {
            slot.cancel.cancel();
            let _ = shared.event_sender.send(ScannerEvent::ScanDiscarded {
                generation: slot.generation,
            });
        }
        slot.generation += 1;
        slot.status = ScanStatus::Scanning;
        slot.root = Some(root.clone());
        slot.cancel = CancelToken::new();
        *tree = None;

        let generation = slot.generation;
        let cancel = slot.cancel.clone();
        let _ = shared.event_sender.send(ScannerEvent::ScanStarted {
            generation,
            root: root.clone(),
        });
        drop(slot);
        drop(tree);

        let worker = Arc::clone(shared);
        let job = move || worker.run_scan(generation, root, &cancel);
        match Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(job)),
            Err(_) => job(),
        }
        generation
    }

    pub fn status(&self) -> ScanStatus {
        self.shared.slot.lock().status
    }

    /// Whether a tree is available.
    pub fn is_ready(&self) -> bool {
        self.status() == ScanStatus::Ready
    }

    /// Generation of the most recent `set_locator` call.
    pub fn generation(&self) -> u64 {
        self.shared.slot.lock().generation
    }

    pub fn root(&self) -> Option<Locator> {
        self.shared.slot.lock().root.clone()
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.shared.context
    }

    /// Runs `f` on the ready tree. `None` while no tree is available.
    ///
    /// `f` may query `status`, `root` and `generation` but must not call
    /// `set_locator`, which waits for the tree lock held here.
    pub fn with_library<R>(&self, f: impl FnOnce(&MusicLibrary) -> R) -> Option<R> {
        self.shared.library.read().as_ref().map(f)
    }

    /// Runs `f` on the ready tree with write access, e.g. for renames.
    /// The same restrictions as for [`Self::with_library`] apply.
    pub fn with_library_mut<R>(&self, f: impl FnOnce(&mut MusicLibrary) -> R) -> Option<R> {
        self.shared.library.write().as_mut().map(f)
    }

    /// Subscribe to scanner events.
    pub fn subscribe(&self) -> TokioReceiver<ScannerEvent> {
        self.shared.event_sender.subscribe()
    }

    /// Waits until no scan is in flight and returns the resulting status.
    pub async fn wait_until_settled(&self) -> ScanStatus {
        let mut receiver = self.subscribe();
        loop {
            let status = self.status();
            if status != ScanStatus::Scanning {
                return status;
            }
            match receiver.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return self.status(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::create_dir_all,
        sync::{Arc, mpsc},
        thread::{sleep, spawn},
        time::Duration,
    };

    use {
        tempfile::TempDir,
        tokio::{sync::broadcast::Receiver, time::timeout},
    };

    use crate::{
        error::domain::LibraryError,
        library::{
            entry::Locator,
            scanner::{
                CatalogItem, ChildKind, LibraryScanner, RemoteCatalog, ScanContext, ScanStatus,
                ScannerConfig, ScannerEvent,
                context::tests::{FakeReader, fake_context, write_fixture},
            },
        },
    };

    /// Catalog whose listings take a while, keeping a scan in flight.
    #[derive(Debug)]
    struct SlowCatalog;

    impl RemoteCatalog for SlowCatalog {
        fn list(&self, _id: &str, _kind: ChildKind) -> Result<Vec<CatalogItem>, LibraryError> {
            sleep(Duration::from_millis(200));
            Ok(vec![CatalogItem {
                name: "slow artist".to_string(),
                id: "artist".to_string(),
                file_size: None,
                length_ms: None,
            }])
        }

        fn track_format(&self, _id: &str) -> Result<(u32, u32), LibraryError> {
            Ok((44_100, 16))
        }
    }

    async fn next_event(receiver: &mut Receiver<ScannerEvent>) -> ScannerEvent {
        timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for scanner event")
            .unwrap()
    }

    #[tokio::test]
    async fn test_scan_completes_with_statistics() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(
            temp_dir.path(),
            &[
                ("ac-dc", "back in black [hd]", "01.flac", 3),
                ("ac-dc", "back in black [hd]", "02.flac", 4),
            ],
        );
        let (context, _) = fake_context();
        let scanner = LibraryScanner::new(context);
        let mut events = scanner.subscribe();
        assert_eq!(scanner.status(), ScanStatus::Idle);

        let generation = scanner.set_locator(temp_dir.path(), false);
        assert_eq!(
            next_event(&mut events).await,
            ScannerEvent::ScanStarted {
                generation,
                root: Locator::Local(temp_dir.path().to_path_buf()),
            }
        );
        let ScannerEvent::ScanCompleted {
            generation: done,
            statistics,
        } = next_event(&mut events).await
        else {
            panic!("expected completion");
        };
        assert_eq!(done, generation);
        assert_eq!(statistics.tracks, 2);
        assert_eq!(statistics.total_size, 7);
        assert!(scanner.is_ready());
        let artist = scanner.with_library(|library| {
            library.artists().next().unwrap().artist_name().to_string()
        });
        assert_eq!(artist.as_deref(), Some("ac-dc"));
    }

    #[tokio::test]
    async fn test_missing_root_reports_failure() {
        let temp_dir = TempDir::new().unwrap();
        let (context, _) = fake_context();
        let scanner = LibraryScanner::new(context);
        let mut events = scanner.subscribe();

        let generation = scanner.set_locator(temp_dir.path().join("missing"), false);
        let status = timeout(Duration::from_secs(5), scanner.wait_until_settled())
            .await
            .unwrap();
        assert_eq!(status, ScanStatus::Error);
        assert!(scanner.with_library(|_| ()).is_none());

        assert!(matches!(next_event(&mut events).await, ScannerEvent::ScanStarted { .. }));
        let failed = next_event(&mut events).await;
        assert!(matches!(failed, ScannerEvent::ScanFailed { .. }));
        assert_eq!(failed.generation(), generation);
        assert!(failed.is_terminal());
    }

    #[tokio::test]
    async fn test_same_root_is_not_rescanned_unless_forced() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(temp_dir.path(), &[("a", "b", "x.flac", 1)]);
        let (context, _) = fake_context();
        let scanner = LibraryScanner::new(context);
        scanner.set_locator(temp_dir.path(), false);
        timeout(Duration::from_secs(5), scanner.wait_until_settled())
            .await
            .unwrap();

        create_dir_all(temp_dir.path().join("new artist")).unwrap();
        let mut events = scanner.subscribe();
        let generation = scanner.set_locator(temp_dir.path(), false);
        assert!(matches!(
            next_event(&mut events).await,
            ScannerEvent::ScanCompleted { generation: g, .. } if g == generation
        ));
        assert!(scanner.is_ready());
        assert_eq!(scanner.with_library(|l| l.artist_count()), Some(1));

        scanner.set_locator(temp_dir.path(), true);
        let status = timeout(Duration::from_secs(5), scanner.wait_until_settled())
            .await
            .unwrap();
        assert_eq!(status, ScanStatus::Ready);
        assert_eq!(scanner.with_library(|l| l.artist_count()), Some(2));
    }

    #[tokio::test]
    async fn test_new_root_discards_in_flight_scan() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(temp_dir.path(), &[("a", "b", "x.flac", 1)]);
        let context = Arc::new(
            ScanContext::new(ScannerConfig::default(), Arc::new(FakeReader::default()))
                .with_catalog(Arc::new(SlowCatalog)),
        );
        let scanner = LibraryScanner::new(context);
        let mut events = scanner.subscribe();

        let first = scanner.set_locator(Locator::Remote("root".to_string()), false);
        let second = scanner.set_locator(temp_dir.path(), false);
        assert!(second > first);

        let mut terminal = Vec::new();
        while terminal.len() < 2 {
            let event = next_event(&mut events).await;
            if event.is_terminal() {
                terminal.push(event);
            }
        }
        assert_eq!(terminal[0], ScannerEvent::ScanDiscarded { generation: first });
        assert!(matches!(
            terminal[1],
            ScannerEvent::ScanCompleted { generation, .. } if generation == second
        ));
        assert_eq!(
            scanner.root(),
            Some(Locator::Local(temp_dir.path().to_path_buf()))
        );

        // The superseded scan never reports twice.
        sleep(Duration::from_millis(300));
        assert!(events.try_recv().is_err());
        assert!(scanner.with_library(|l| l.artist("a").is_some()).unwrap());
    }

    #[test]
    fn test_scan_runs_inline_without_runtime() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(temp_dir.path(), &[("a", "b", "x.flac", 1)]);
        let (context, _) = fake_context();
        let scanner = LibraryScanner::new(context);

        let generation = scanner.set_locator(temp_dir.path(), false);
        assert_eq!(generation, 1);
        assert_eq!(scanner.status(), ScanStatus::Ready);
        let renamed = scanner
            .with_library_mut(|library| library.rename_artist("a", "ac-dc"))
            .unwrap();
        assert!(renamed.is_ok());
        assert!(temp_dir.path().join("ac-dc").is_dir());
    }

    #[test]
    fn test_library_closure_can_query_scanner_during_rescan() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_fixture(first.path(), &[("a", "b", "x.flac", 1)]);
        write_fixture(second.path(), &[("c", "d", "y.flac", 2)]);
        let (context, _) = fake_context();
        let scanner = LibraryScanner::new(context);
        scanner.set_locator(first.path(), false);

        let (done_sender, done_receiver) = mpsc::channel();
        let handle = scanner.clone();
        let second_root = second.path().to_path_buf();
        spawn(move || {
            let seen = handle.with_library_mut(|_| {
                let rescanner = handle.clone();
                let rescan = spawn(move || rescanner.set_locator(second_root.as_path(), true));
                sleep(Duration::from_millis(100));
                (handle.status(), handle.generation(), rescan)
            });
            let _ = done_sender.send(seen);
        });

        let (status, generation, rescan) = done_receiver
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(status, ScanStatus::Ready);
        assert_eq!(generation, 1);
        assert_eq!(rescan.join().unwrap(), 2);
        assert_eq!(scanner.status(), ScanStatus::Ready);
        assert_eq!(scanner.with_library(|library| library.total_size()), Some(2));
    }
}
