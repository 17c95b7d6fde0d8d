//! Domain-specific error types using `thiserror`.
//!
//! This module defines the main error enum for the library engine. Tag
//! reading, settings and snapshot persistence keep their own error types next
//! to the code that raises them and convert into `LibraryError` where they
//! cross into the library tree.

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

use crate::{audio::metadata::MetadataError, library::snapshot::SnapshotError};

/// Library-related errors.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Filesystem failure while listing, renaming or copying.
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: IoError,
    },
    /// Remote catalog query failed.
    #[error("Remote catalog error: {reason}")]
    Catalog { reason: String },
    /// A remote locator was scanned without a catalog configured.
    #[error("No remote catalog available for {locator}")]
    NoCatalog { locator: String },
    /// The entry is not backed by local storage and cannot be renamed or
    /// written to.
    #[error("Entry is not backed by local storage: {locator}")]
    NotLocal { locator: String },
    /// The requested name cannot be used as an entry name.
    #[error("Invalid entry name: {name:?}")]
    InvalidName { name: String },
    /// Another entry with the same name already exists.
    #[error("Entry already exists: {name}")]
    AlreadyExists { name: String },
    /// Entry not found.
    #[error("Entry not found: {entity} named {name}")]
    NotFound { entity: String, name: String },
    /// A parent index lost track of one of its children.
    #[error("Index invariant violated: {reason}")]
    IndexInvariant { reason: String },
    /// A cooperative cancellation point was hit.
    #[error("Operation cancelled")]
    Cancelled,
    /// Tag reading error.
    #[error("Metadata error: {0}")]
    MetadataError(#[from] MetadataError),
    /// Snapshot store error.
    #[error("Snapshot error: {0}")]
    SnapshotError(#[from] SnapshotError),
}

impl LibraryError {
    /// Creates a new `Io` error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new `NotFound` error.
    pub fn not_found(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// Creates a new `Catalog` error.
    pub fn catalog(reason: impl Into<String>) -> Self {
        Self::Catalog {
            reason: reason.into(),
        }
    }
}
