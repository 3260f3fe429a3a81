//! Data contracts passed between pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::workdir::AssetName;

/// Container format of an acquired or produced asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetFormat {
    /// RIFF/WAVE, linear PCM
    Wav,
    /// MPEG-1 Layer III
    Mp3,
}

impl AssetFormat {
    /// File extension without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// MIME type sent to clients
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A local audio file produced by the acquirer
///
/// Owned by the orchestrator for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    /// Name inside the working directory
    pub name: AssetName,
    /// Absolute or working-dir-relative path on disk
    pub path: PathBuf,
    pub format: AssetFormat,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Locator the asset was retrieved from
    pub source_locator: String,
}

/// Single-channel signed 16-bit PCM samples at a fixed rate
///
/// Immutable once built: effect stages consume a buffer by reference and
/// return a new, independently owned one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer(Vec<i16>);

impl SampleBuffer {
    pub fn new(samples: Vec<i16>) -> Self {
        Self(samples)
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, i16> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<i16> {
        self.0
    }
}

impl From<Vec<i16>> for SampleBuffer {
    fn from(samples: Vec<i16>) -> Self {
        Self(samples)
    }
}

impl FromIterator<i16> for SampleBuffer {
    fn from_iter<I: IntoIterator<Item = i16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl AsRef<[i16]> for SampleBuffer {
    fn as_ref(&self) -> &[i16] {
        &self.0
    }
}

/// Decoded PCM payload with the rate declared in its container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: SampleBuffer,
    pub sample_rate_hz: u32,
}

impl PcmAudio {
    /// Duration implied by sample count and rate
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }
}
