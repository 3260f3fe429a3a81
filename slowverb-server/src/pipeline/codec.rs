//! PCM codec: single-channel signed 16-bit WAV in and out
//!
//! `decode` accepts any sample rate declared in the header. `encode` always
//! declares [`OUTPUT_SAMPLE_RATE_HZ`], whatever rate the samples were
//! decoded at; no resampling happens, so a lower source rate plays back faster
//! and higher.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use super::error::{PipelineError, PipelineResult};
use super::types::{PcmAudio, SampleBuffer};

/// Sample rate written into every encoded header
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 44_100;

/// Only channel count the codec accepts or produces
pub const CHANNELS: u16 = 1;

/// Only bit depth the codec accepts or produces
pub const BITS_PER_SAMPLE: u16 = 16;

/// Decode a mono 16-bit PCM WAV file
///
/// # Errors
/// * `UnsupportedFormat` - not WAV, not mono, not 16-bit integer PCM, or corrupt
/// * `Io` - file could not be opened or read
pub fn decode(path: &Path) -> PipelineResult<PcmAudio> {
    tracing::debug!(path = %path.display(), "Decoding PCM asset");

    let file = File::open(path)?;
    let audio = decode_from(BufReader::new(file))?;

    tracing::debug!(
        path = %path.display(),
        samples = audio.samples.len(),
        sample_rate = audio.sample_rate_hz,
        duration_seconds = format!("{:.2}", audio.duration_seconds()),
        "PCM decode complete"
    );

    Ok(audio)
}

/// Decode from any reader positioned at the start of a WAV container
pub fn decode_from<R: Read>(reader: R) -> PipelineResult<PcmAudio> {
    let reader = WavReader::new(reader).map_err(decode_error)?;
    let spec = reader.spec();
    check_spec(&spec)?;

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(decode_error)?;

    Ok(PcmAudio {
        samples: SampleBuffer::new(samples),
        sample_rate_hz: spec.sample_rate,
    })
}

/// Encode `samples` to a new file at `path`, replacing any existing file
///
/// # Errors
/// `EncodingFailed` if the file cannot be created or written.
pub fn encode(samples: &SampleBuffer, source_rate_hz: u32, path: &Path) -> PipelineResult<()> {
    let file = File::create(path).map_err(PipelineError::encoding)?;
    encode_to(samples, source_rate_hz, BufWriter::new(file))?;

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        "PCM encode complete"
    );
    Ok(())
}

/// Encode into a seekable writer (the WAV header is patched on finalize)
pub fn encode_to<W: Write + Seek>(
    samples: &SampleBuffer,
    source_rate_hz: u32,
    writer: W,
) -> PipelineResult<()> {
    if source_rate_hz != OUTPUT_SAMPLE_RATE_HZ {
        tracing::debug!(
            source_rate = source_rate_hz,
            output_rate = OUTPUT_SAMPLE_RATE_HZ,
            "Writing header at fixed output rate without resampling"
        );
    }

    let mut writer = WavWriter::new(writer, output_spec()).map_err(PipelineError::encoding)?;
    for &sample in samples.iter() {
        writer.write_sample(sample).map_err(PipelineError::encoding)?;
    }
    writer.finalize().map_err(PipelineError::encoding)
}

fn output_spec() -> WavSpec {
    WavSpec {
        channels: CHANNELS,
        sample_rate: OUTPUT_SAMPLE_RATE_HZ,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

fn check_spec(spec: &WavSpec) -> PipelineResult<()> {
    if spec.channels != CHANNELS {
        return Err(PipelineError::unsupported(format!(
            "expected {} channel, found {}",
            CHANNELS, spec.channels
        )));
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(PipelineError::unsupported(format!(
            "expected {}-bit integer PCM, found {}-bit {:?}",
            BITS_PER_SAMPLE, spec.bits_per_sample, spec.sample_format
        )));
    }
    Ok(())
}

fn decode_error(error: hound::Error) -> PipelineError {
    match error {
        hound::Error::IoError(e) => PipelineError::Io(e),
        other => PipelineError::unsupported(other.to_string()),
    }
}
