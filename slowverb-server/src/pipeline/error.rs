//! Pipeline error taxonomy
//!
//! None of these are retried inside the pipeline; the orchestrator maps each
//! one to a single client-visible failure.

use std::time::Duration;
use thiserror::Error;

use super::run::RequestState;

/// Result type for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced while turning a locator into processed audio
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Locator was empty or whitespace
    #[error("Locator must not be empty")]
    EmptyLocator,

    /// Locator would be read by the retrieval tool as an option
    #[error("Invalid locator: {reason}")]
    InvalidLocator { reason: String },

    /// Retrieval tool missing, failed, or produced no usable file
    #[error("Acquisition failed: {cause}")]
    AcquisitionFailed { cause: String },

    /// Asset is not single-channel signed 16-bit PCM
    #[error("Unsupported audio format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Filter-graph process could not be launched
    #[error("Filter graph failed to start: {cause}")]
    TransformStartFailed { cause: String },

    /// Filter-graph process failed after output was committed to the client
    #[error("Filter graph aborted after {bytes_sent} bytes: {cause}")]
    TransformAbortedMidStream { bytes_sent: u64, cause: String },

    /// Output container could not be written
    #[error("Encoding failed: {cause}")]
    EncodingFailed { cause: String },

    /// A stage ran past its configured deadline
    #[error("{stage} exceeded deadline of {}s", .after.as_secs())]
    DeadlineExceeded { stage: RequestState, after: Duration },

    /// Request was cancelled (shutdown or client gone)
    #[error("{stage} cancelled")]
    Cancelled { stage: RequestState },

    /// Local I/O failure outside encoding
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn acquisition(cause: impl Into<String>) -> Self {
        Self::AcquisitionFailed {
            cause: cause.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    pub fn encoding(cause: impl std::fmt::Display) -> Self {
        Self::EncodingFailed {
            cause: cause.to_string(),
        }
    }

    /// Stable code for logs and client error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyLocator => "EMPTY_LOCATOR",
            Self::InvalidLocator { .. } => "INVALID_LOCATOR",
            Self::AcquisitionFailed { .. } => "ACQUISITION_FAILED",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::TransformStartFailed { .. } => "TRANSFORM_START_FAILED",
            Self::TransformAbortedMidStream { .. } => "TRANSFORM_ABORTED_MID_STREAM",
            Self::EncodingFailed { .. } => "ENCODING_FAILED",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
