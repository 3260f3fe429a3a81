//! Pipeline orchestrator
//!
//! Sequences acquisition → processing → streaming for one locator. Stages
//! run strictly one after another; only the streaming path overlaps
//! production and consumption. Nothing is retried.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::acquirer::SourceAcquirer;
use super::codec;
use super::effects::{self, EffectParameters};
use super::error::{PipelineError, PipelineResult};
use super::run::{RequestRun, RequestState};
use super::stream::ProcessedStream;
use super::transformer::StreamingTransformer;
use super::types::{AssetFormat, AudioAsset};
use super::workdir::{AssetName, WorkingDirectory};

/// How the acquired asset is turned into processed audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransformStrategy {
    /// Decode, decimate + echo, and re-encode inside this process, then stream the file
    InProcess,
    /// Pipe the external filter graph's stdout straight to the sink
    #[default]
    ExternalStream,
}

impl TransformStrategy {
    /// Format requested from the retrieval tool
    pub fn acquire_format(self) -> AssetFormat {
        match self {
            Self::InProcess => AssetFormat::Wav,
            Self::ExternalStream => AssetFormat::Mp3,
        }
    }
}

impl fmt::Display for TransformStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProcess => f.write_str("in_process"),
            Self::ExternalStream => f.write_str("external_stream"),
        }
    }
}

/// Orchestrator settings that are not owned by a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub strategy: TransformStrategy,
    pub effects: EffectParameters,
    /// Bound on in-process decode/effects/encode
    pub transform_timeout: Duration,
    /// When false, a request's files are deleted once its stream ends
    pub keep_intermediate_files: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strategy: TransformStrategy::default(),
            effects: EffectParameters::default(),
            transform_timeout: Duration::from_secs(600),
            keep_intermediate_files: true,
        }
    }
}

/// Deletes a request's working files when dropped
struct Cleanup {
    workdir: Arc<dyn WorkingDirectory>,
    names: Vec<AssetName>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.workdir.remove(name) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(asset = %name, error = %e, "Failed to remove working file");
                }
            }
        }
    }
}

/// Logs streams that were dropped before reaching a terminal state
struct CompletionGuard {
    request_id: Uuid,
    finished: bool,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                request_id = %self.request_id,
                "Response stream dropped before completion (client disconnected?)"
            );
        }
    }
}

/// Turns locators into processed audio streams
#[derive(Debug)]
pub struct PipelineOrchestrator {
    options: PipelineOptions,
    acquirer: SourceAcquirer,
    transformer: StreamingTransformer,
    workdir: Arc<dyn WorkingDirectory>,
    shutdown: CancellationToken,
    last_error: Arc<RwLock<Option<String>>>,
}

impl PipelineOrchestrator {
    pub fn new(
        options: PipelineOptions,
        acquirer: SourceAcquirer,
        transformer: StreamingTransformer,
        workdir: Arc<dyn WorkingDirectory>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            options,
            acquirer,
            transformer,
            workdir,
            shutdown,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn strategy(&self) -> TransformStrategy {
        self.options.strategy
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Most recent request failure, for diagnostics
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Cancel every in-flight request and kill their external processes
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Acquire `locator` and return its processed audio using the configured strategy
    pub async fn process_locator(&self, locator: &str) -> PipelineResult<ProcessedStream> {
        self.process_with_strategy(locator, self.options.strategy).await
    }

    /// Same as [`process_locator`](Self::process_locator) with an explicit strategy
    pub async fn process_with_strategy(
        &self,
        locator: &str,
        strategy: TransformStrategy,
    ) -> PipelineResult<ProcessedStream> {
        let mut run = RequestRun::new(locator.trim());
        let cancel = self.shutdown.child_token();

        tracing::info!(
            request_id = %run.request_id,
            locator = %run.locator,
            strategy = %strategy,
            "Processing locator"
        );

        run.transition_to(RequestState::Acquiring);
        let asset = match self
            .acquirer
            .acquire(locator, strategy.acquire_format(), &cancel)
            .await
        {
            Ok(asset) => asset,
            Err(e) => return Err(self.record_failure(&mut run, e).await),
        };

        run.transition_to(RequestState::Processing);
        let mut files = vec![asset.name.clone()];
        let processed = match strategy {
            TransformStrategy::InProcess => {
                let output = asset.name.derived("processed", AssetFormat::Wav);
                files.push(output.clone());
                self.run_in_process(&asset, &output, &cancel).await
            }
            TransformStrategy::ExternalStream => {
                self.transformer.transform(&asset.path, cancel.clone()).await
            }
        };

        let cleanup = (!self.options.keep_intermediate_files).then(|| Cleanup {
            workdir: Arc::clone(&self.workdir),
            names: files,
        });

        let stream = match processed {
            Ok(stream) => stream,
            Err(e) => {
                drop(cleanup);
                return Err(self.record_failure(&mut run, e).await);
            }
        };

        run.transition_to(RequestState::Streaming);
        Ok(self.track(stream, run, cleanup))
    }

    async fn run_in_process(
        &self,
        asset: &AudioAsset,
        output: &AssetName,
        cancel: &CancellationToken,
    ) -> PipelineResult<ProcessedStream> {
        let input_file = self.workdir.open(&asset.name)?;
        let output_file = self.workdir.create(output).map_err(PipelineError::encoding)?;
        let params = self.options.effects;
        let job_cancel = cancel.clone();

        let job = tokio::task::spawn_blocking(move || -> PipelineResult<(usize, usize)> {
            let cancelled = || PipelineError::Cancelled {
                stage: RequestState::Processing,
            };

            let decoded = codec::decode_from(BufReader::new(input_file))?;
            if job_cancel.is_cancelled() {
                return Err(cancelled());
            }

            let processed = effects::apply(&decoded.samples, &params);
            if job_cancel.is_cancelled() {
                return Err(cancelled());
            }

            codec::encode_to(&processed, decoded.sample_rate_hz, BufWriter::new(output_file))?;
            Ok((decoded.samples.len(), processed.len()))
        });

        let (samples_in, samples_out) = tokio::select! {
            joined = job => joined.map_err(|e| {
                PipelineError::Io(std::io::Error::other(format!("processing task failed: {}", e)))
            })??,
            _ = tokio::time::sleep(self.options.transform_timeout) => {
                // Stops the blocking job at its next checkpoint
                cancel.cancel();
                return Err(PipelineError::DeadlineExceeded {
                    stage: RequestState::Processing,
                    after: self.options.transform_timeout,
                });
            }
            _ = cancel.cancelled() => {
                return Err(PipelineError::Cancelled {
                    stage: RequestState::Processing,
                });
            }
        };

        tracing::info!(
            asset = %asset.name,
            output = %output,
            samples_in,
            samples_out,
            "In-process effects applied"
        );

        let file = tokio::fs::File::from_std(self.workdir.open(output)?);
        let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(PipelineError::Io));
        Ok(ProcessedStream::new(AssetFormat::Wav, stream))
    }

    /// Forward `stream`, recording completion or mid-stream abort
    fn track(
        &self,
        stream: ProcessedStream,
        mut run: RequestRun,
        cleanup: Option<Cleanup>,
    ) -> ProcessedStream {
        let format = stream.format();
        let last_error = Arc::clone(&self.last_error);
        let mut inner = stream.into_inner();

        let tracked = async_stream::stream! {
            let _cleanup = cleanup;
            let mut guard = CompletionGuard {
                request_id: run.request_id,
                finished: false,
            };
            let mut bytes_sent: u64 = 0;

            while let Some(item) = inner.next().await {
                match item {
                    Ok(chunk) => {
                        bytes_sent += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        tracing::error!(
                            request_id = %run.request_id,
                            locator = %run.locator,
                            bytes_sent,
                            kind = e.kind(),
                            error = %e,
                            "Stream aborted after response headers were sent; client holds a truncated file"
                        );
                        run.transition_to(RequestState::Aborted);
                        *last_error.write().await = Some(format!("{}: {}", e.kind(), e));
                        guard.finished = true;
                        yield Err(e);
                        return;
                    }
                }
            }

            run.transition_to(RequestState::Done);
            guard.finished = true;
            tracing::info!(
                request_id = %run.request_id,
                bytes_sent,
                elapsed_ms = run.elapsed().as_millis() as u64,
                "Request complete"
            );
        };

        ProcessedStream::new(format, tracked)
    }

    async fn record_failure(&self, run: &mut RequestRun, error: PipelineError) -> PipelineError {
        let error = run.fail(error);
        *self.last_error.write().await = Some(format!("{}: {}", error.kind(), error));
        error
    }
}
