//! Audio file inspection.
//!
//! Playback lives elsewhere; the library engine only needs to read the
//! technical properties of audio files.

pub mod metadata;

pub use metadata::{AudioProperties, LoftyReader, MetadataError, MetadataReader};
