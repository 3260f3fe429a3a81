//! Processed audio byte stream handed to the transport layer

use axum::body::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::error::PipelineError;
use super::types::AssetFormat;

/// Boxed stream of encoded audio chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, PipelineError>>;

/// Encoded audio produced for one request
///
/// Finite and not restartable. Items may still be in production while the
/// sink reads; an `Err` item ends the stream and means the bytes already
/// yielded are a truncated file.
pub struct ProcessedStream {
    format: AssetFormat,
    inner: ByteStream,
}

impl ProcessedStream {
    pub fn new<S>(format: AssetFormat, inner: S) -> Self
    where
        S: Stream<Item = Result<Bytes, PipelineError>> + Send + 'static,
    {
        Self {
            format,
            inner: inner.boxed(),
        }
    }

    pub fn format(&self) -> AssetFormat {
        self.format
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Download file name suggested to clients
    pub fn file_name(&self) -> String {
        format!("reverb_audio.{}", self.format.extension())
    }

    pub fn into_inner(self) -> ByteStream {
        self.inner
    }

    /// Read until the end or the first error
    ///
    /// Returns every byte received before the error, plus the error if any.
    pub async fn drain(mut self) -> (Vec<u8>, Option<PipelineError>) {
        let mut received = Vec::new();
        while let Some(item) = self.inner.next().await {
            match item {
                Ok(chunk) => received.extend_from_slice(&chunk),
                Err(e) => return (received, Some(e)),
            }
        }
        (received, None)
    }
}

impl Stream for ProcessedStream {
    type Item = Result<Bytes, PipelineError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ProcessedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedStream")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
