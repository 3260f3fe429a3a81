//! In-process effect engine: decimation slowdown followed by feedback echo
//!
//! Both stages are naive. Decimation keeps every Nth sample with
//! no anti-aliasing filter; the echo adds a scaled copy of the *already
//! processed* previous sample, so the tail compounds across the whole buffer.
//! Output is bit-exact for a given input and parameter set.

use serde::{Deserialize, Serialize};
use std::num::{NonZeroI32, NonZeroUsize};

use super::types::SampleBuffer;

/// What to do when the echo sum leaves the signed 16-bit range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the low 16 bits (two's complement wraparound)
    #[default]
    Wrap,
    /// Clamp to `i16::MIN..=i16::MAX`
    Saturate,
}

/// Echo feedback gain as an integer ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoGain {
    pub numerator: i32,
    pub denominator: NonZeroI32,
}

impl EchoGain {
    pub const HALF: EchoGain = EchoGain {
        numerator: 1,
        denominator: match NonZeroI32::new(2) {
            Some(d) => d,
            None => unreachable!(),
        },
    };

    pub fn new(numerator: i32, denominator: NonZeroI32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Effect configuration, constant for the lifetime of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectParameters {
    pub decimation_factor: NonZeroUsize,
    pub echo_gain: EchoGain,
    pub overflow: OverflowPolicy,
}

impl EffectParameters {
    pub fn new(decimation_factor: NonZeroUsize, echo_gain: EchoGain, overflow: OverflowPolicy) -> Self {
        Self {
            decimation_factor,
            echo_gain,
            overflow,
        }
    }

    /// Build from unchecked config values
    ///
    /// # Errors
    /// `Config` if the factor is zero or the denominator is zero.
    pub fn from_raw(
        decimation_factor: usize,
        echo_gain_numerator: i32,
        echo_gain_denominator: i32,
        overflow: OverflowPolicy,
    ) -> slowverb_common::Result<Self> {
        let factor = NonZeroUsize::new(decimation_factor).ok_or_else(|| {
            slowverb_common::Error::Config("decimation_factor must be at least 1".to_string())
        })?;
        let denominator = NonZeroI32::new(echo_gain_denominator).ok_or_else(|| {
            slowverb_common::Error::Config("echo_gain_denominator must not be zero".to_string())
        })?;

        Ok(Self::new(
            factor,
            EchoGain::new(echo_gain_numerator, denominator),
            overflow,
        ))
    }
}

impl Default for EffectParameters {
    /// Factor 2, gain 1/2, wrapping arithmetic
    fn default() -> Self {
        Self {
            decimation_factor: NonZeroUsize::MIN.saturating_add(1),
            echo_gain: EchoGain::HALF,
            overflow: OverflowPolicy::Wrap,
        }
    }
}

/// Apply decimation then feedback echo, returning a new buffer
///
/// Output length is always `floor(len(samples) / decimation_factor)`.
/// An empty input yields an empty output.
pub fn apply(samples: &SampleBuffer, params: &EffectParameters) -> SampleBuffer {
    let mut output = decimate(samples, params.decimation_factor).into_vec();
    feedback_echo_in_place(&mut output, params.echo_gain, params.overflow);
    SampleBuffer::new(output)
}

/// Keep `samples[i * factor]` for `i` in `0..floor(len / factor)`
pub fn decimate(samples: &SampleBuffer, factor: NonZeroUsize) -> SampleBuffer {
    let factor = factor.get();
    let output_len = samples.len() / factor;

    samples
        .iter()
        .step_by(factor)
        .take(output_len)
        .copied()
        .collect()
}

/// Feedback echo over a copy of `samples`
///
/// `out[i] = out[i] + out[i-1] * numerator / denominator` for `i >= 1`,
/// left to right, with division truncating toward zero.
pub fn feedback_echo(samples: &SampleBuffer, gain: EchoGain, overflow: OverflowPolicy) -> SampleBuffer {
    let mut output = samples.as_slice().to_vec();
    feedback_echo_in_place(&mut output, gain, overflow);
    SampleBuffer::new(output)
}

fn feedback_echo_in_place(samples: &mut [i16], gain: EchoGain, overflow: OverflowPolicy) {
    for i in 1..samples.len() {
        samples[i] = echo_sample(samples[i], samples[i - 1], gain, overflow);
    }
}

fn echo_sample(current: i16, previous: i16, gain: EchoGain, overflow: OverflowPolicy) -> i16 {
    // i16 * i32 always fits in i64, so only the final narrowing can overflow
    let feedback = i64::from(previous) * i64::from(gain.numerator) / i64::from(gain.denominator.get());
    let value = i64::from(current) + feedback;

    match overflow {
        OverflowPolicy::Wrap => value as i16,
        OverflowPolicy::Saturate => value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16,
    }
}
