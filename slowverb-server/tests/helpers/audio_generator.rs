//! Audio Test Fixture Generator
//!
//! Writes 16-bit PCM WAV tones for pipeline tests

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency_hz: f32,
    /// Peak level as a fraction of full scale
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 2.0,
            sample_rate: 44100,
            channels: 1,
            frequency_hz: 440.0,
            amplitude: 0.3,
        }
    }
}

/// Sample values of the tone described by `config` (one channel)
pub fn tone_samples(config: &AudioConfig) -> Vec<i16> {
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
    (0..total_samples)
        .map(|i| {
            let t = i as f32 / config.sample_rate as f32;
            (config.amplitude
                * (2.0 * std::f32::consts::PI * config.frequency_hz * t).sin()
                * i16::MAX as f32) as i16
        })
        .collect()
}

/// Generate a sine-tone WAV file
///
/// # Returns
/// Generated file path
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in tone_samples(config) {
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}
