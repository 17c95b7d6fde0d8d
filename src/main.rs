//! xplay-library - music library scanner
//!
//! Scans the primary library (and optionally a mobile copy), prints library
//! statistics and, for two libraries, a comparison summary together with the
//! synchronization a full sync would perform.

use std::{env::args, path::Path, process::ExitCode, sync::Arc, time::SystemTime};

use {
    anyhow::{Result, anyhow, bail},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt},
};

use xplay_library::{
    ErrorReporter, LibraryError, LibraryScanner, LoftyReader, ResultExt, ScanContext,
    SettingsManager,
    library::{
        JsonSnapshotStore, LibraryStatistics, ScanStatus, ScannerConfig, SnapshotStore,
        SyncOptions, SyncPlan,
    },
};

/// Snapshot store name of the mobile copy.
const MOBILE_SNAPSHOT: &str = "mobile";

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ErrorReporter::error(&e, "xplay-library");
            eprintln!("{}", ErrorReporter::to_user_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let settings_manager = SettingsManager::new().add_context("Loading settings")?;
    let settings = settings_manager.get_settings().clone();

    let mut positional = args().skip(1);
    let primary_root = positional
        .next()
        .or_else(|| settings.library_directory.clone())
        .ok_or_else(|| anyhow!("No library directory given or configured"))?;
    let secondary_root = positional
        .next()
        .or_else(|| settings.mobile_library_directory.clone());

    let context = Arc::new(ScanContext::new(
        ScannerConfig::from(&settings),
        Arc::new(LoftyReader),
    ));
    let primary = LibraryScanner::new(context.clone());
    primary.set_locator(Path::new(&primary_root), false);

    let secondary = secondary_root.as_ref().map(|root| {
        let scanner = LibraryScanner::new(context.clone());
        scanner.set_locator(Path::new(root), false);
        scanner
    });

    settle(&primary, &primary_root).await?;
    print_statistics(&primary_root, &primary);

    let (Some(secondary), Some(secondary_root)) = (secondary, secondary_root) else {
        return Ok(());
    };
    settle(&secondary, &secondary_root).await?;
    print_statistics(&secondary_root, &secondary);

    let store = JsonSnapshotStore::in_cache_dir(MOBILE_SNAPSHOT);
    let mut snapshot = store.load().add_context("Loading sync snapshot")?;
    let options = SyncOptions::from(&settings);
    let planned = primary
        .with_library(|primary| {
            secondary.with_library(|secondary| {
                let comparison = primary.compare(secondary);
                println!(
                    "Missing on {secondary_root}: {} artists, {} albums, {} tracks",
                    comparison.missing_artists.len(),
                    comparison.missing_albums.len(),
                    comparison.missing_tracks.len(),
                );
                println!(
                    "Only on {secondary_root}: {} artists, {} albums, {} tracks",
                    comparison.additional_artists.len(),
                    comparison.additional_albums.len(),
                    comparison.additional_tracks.len(),
                );
                println!("Different tracks: {}", comparison.different_tracks.len());

                snapshot.record(&primary.compare_existing(secondary), SystemTime::now());
                let plan = SyncPlan::from_comparison(primary, secondary, &comparison, &options)?;
                for action in plan.actions() {
                    debug!(%action, "Planned");
                }
                Ok::<_, LibraryError>(plan.actions().len())
            })
        })
        .flatten()
        .ok_or_else(|| anyhow!("Library was rescanned while comparing"))?;

    let actions = planned.add_context("Planning synchronization")?;
    println!("A full sync would perform {actions} actions");
    store
        .save(&snapshot)
        .add_contextf(format!("Saving sync snapshot to {}", store.path().display()))?;
    info!(path = %store.path().display(), "Sync snapshot updated");
    Ok(())
}

/// Waits for the scan of `root` and fails unless it produced a tree.
async fn settle(scanner: &LibraryScanner, root: &str) -> Result<()> {
    match scanner.wait_until_settled().await {
        ScanStatus::Ready => Ok(()),
        status => bail!("Scanning {root} ended in state {status:?}"),
    }
}

fn print_statistics(root: &str, scanner: &LibraryScanner) {
    let statistics = scanner
        .with_library(|library| library.statistics())
        .unwrap_or_default();
    let LibraryStatistics {
        artists,
        albums,
        tracks,
        total_size,
    } = statistics;
    println!("{root}: {artists} artists, {albums} albums, {tracks} tracks, {total_size} bytes");
}
