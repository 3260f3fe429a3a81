//! Asset probing
//!
//! Reads container headers with symphonia (format-agnostic: WAV, MP3, ...)
//! to describe an acquired file without decoding it.

use std::path::Path;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{PipelineError, PipelineResult};

/// Bit depth reported for compressed formats that declare none
const DEFAULT_BIT_DEPTH: u16 = 16;

/// Stream parameters declared by an audio container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

/// Probe the default audio track of the file at `path`
///
/// # Errors
/// * `Io` - file could not be opened
/// * `UnsupportedFormat` - unknown container, no audio track, or missing rate/layout
pub fn probe(path: &Path) -> PipelineResult<AssetInfo> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PipelineError::unsupported(format!("probe failed: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::unsupported("no audio track found"))?;

    let params = &track.codec_params;
    let sample_rate_hz = params
        .sample_rate
        .ok_or_else(|| PipelineError::unsupported("sample rate unknown"))?;
    let channels = params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| PipelineError::unsupported("channel layout unknown"))?;
    let bit_depth = params
        .bits_per_sample
        .map(|b| b as u16)
        .unwrap_or(DEFAULT_BIT_DEPTH);

    tracing::debug!(
        path = %path.display(),
        sample_rate = sample_rate_hz,
        channels,
        bit_depth,
        "Probed audio asset"
    );

    Ok(AssetInfo {
        sample_rate_hz,
        channels,
        bit_depth,
    })
}
