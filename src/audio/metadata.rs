//! Audio file property extraction using the `lofty` crate.
//!
//! Only the technical properties the library engine needs are read here:
//! duration, bitrate, sample rate and bit depth. Tracks call into a
//! [`MetadataReader`] lazily, the first time one of those values is asked for.

use std::{fmt::Debug, path::Path};

use {
    lofty::{error::LoftyError, prelude::AudioFile, probe::Probe},
    serde::{Deserialize, Serialize},
    thiserror::Error,
    tracing::debug,
};

/// Error type for metadata extraction operations.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Failed to read or parse the audio file.
    #[error("Failed to read audio file: {0}")]
    ReadError(#[from] LoftyError),
    /// The file carries no usable audio stream.
    #[error("No audio properties found in {path}")]
    NoAudioProperties { path: String },
}

/// Technical properties of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioProperties {
    /// Duration in milliseconds.
    pub length_ms: u64,
    /// Audio bitrate in kbps (0 when unknown).
    pub bitrate: u32,
    /// Sample rate in Hz (0 when unknown).
    pub sample_rate: u32,
    /// Bits per sample (0 for lossy formats without a fixed depth).
    pub bits_per_sample: u32,
}

/// Reads audio properties for a local file.
///
/// Implementations must be shareable between threads: a track may be first
/// read from whichever thread asks for its length.
pub trait MetadataReader: Debug + Send + Sync {
    /// Reads the audio properties of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError` if the file cannot be parsed.
    fn read_properties(&self, path: &Path) -> Result<AudioProperties, MetadataError>;
}

/// [`MetadataReader`] backed by `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl MetadataReader for LoftyReader {
    fn read_properties(&self, path: &Path) -> Result<AudioProperties, MetadataError> {
        let tagged_file = Probe::open(path)?.read()?;
        let properties = tagged_file.properties();

        let length_ms = u64::try_from(properties.duration().as_millis()).unwrap_or(u64::MAX);
        let sample_rate = properties.sample_rate().unwrap_or(0);
        if length_ms == 0 && sample_rate == 0 {
            return Err(MetadataError::NoAudioProperties {
                path: path.display().to_string(),
            });
        }

        let audio = AudioProperties {
            length_ms,
            bitrate: properties
                .audio_bitrate()
                .or_else(|| properties.overall_bitrate())
                .unwrap_or(0),
            sample_rate,
            bits_per_sample: properties.bit_depth().map_or(0, u32::from),
        };
        debug!(path = %path.display(), ?audio, "Read audio properties");
        Ok(audio)
    }
}
