//! Streaming transformer: delegate slowdown + echo to an external filter graph
//!
//! The filter-graph process (ffmpeg by default) writes encoded audio to its
//! stdout, which is forwarded chunk by chunk as it arrives. Nothing is
//! buffered beyond one read chunk, so a slow sink blocks the process through
//! the pipe.
//!
//! Headers are only committed once the first chunk exists. A process that
//! dies before producing output is a clean `TransformStartFailed`; one that
//! dies later leaves the client with a truncated file, and the stream ends with
//! `TransformAbortedMidStream`. That limitation is inherent to streaming before
//! the output is validated.

use axum::body::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::process::{Child, ChildStdout};
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use super::command::{collect_tail, spawn_log_forwarder, ToolCommand};
use super::error::{PipelineError, PipelineResult};
use super::run::RequestState;
use super::stream::ProcessedStream;
use super::types::AssetFormat;

/// Echo stage of the filter graph (`aecho`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoFilter {
    pub in_gain: f64,
    pub out_gain: f64,
    pub delay_ms: u32,
    pub decay: f64,
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self {
            in_gain: 0.8,
            out_gain: 0.9,
            delay_ms: 1000,
            decay: 0.1,
        }
    }
}

/// Two chained audio filters: rate change (slowdown) then echo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterGraph {
    /// Rate the input is reinterpreted at; below the source rate slows it down
    pub sample_rate_hz: u32,
    pub echo: EchoFilter,
}

impl Default for FilterGraph {
    fn default() -> Self {
        Self {
            sample_rate_hz: 40_000,
            echo: EchoFilter::default(),
        }
    }
}

impl FilterGraph {
    /// Filter chain expression, e.g. `asetrate=40000,aecho=0.8:0.9:1000:0.1`
    pub fn expression(&self) -> String {
        format!(
            "asetrate={},aecho={}:{}:{}:{}",
            self.sample_rate_hz,
            self.echo.in_gain,
            self.echo.out_gain,
            self.echo.delay_ms,
            self.echo.decay
        )
    }
}

enum Step {
    Chunk(Option<io::Result<Bytes>>),
    Cancelled,
    TimedOut,
}

async fn next_step(
    reader: &mut ReaderStream<ChildStdout>,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Step {
    tokio::select! {
        chunk = reader.next() => Step::Chunk(chunk),
        _ = cancel.cancelled() => Step::Cancelled,
        _ = tokio::time::sleep_until(deadline) => Step::TimedOut,
    }
}

async fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(tool = %program, error = %e, "Failed to kill filter graph");
    }
}

/// Runs the filter-graph tool and exposes its stdout as a [`ProcessedStream`]
#[derive(Debug, Clone)]
pub struct StreamingTransformer {
    tool: ToolCommand,
    graph: FilterGraph,
    output_format: AssetFormat,
    timeout: Duration,
}

impl StreamingTransformer {
    pub fn new(
        tool: ToolCommand,
        graph: FilterGraph,
        output_format: AssetFormat,
        timeout: Duration,
    ) -> Self {
        Self {
            tool,
            graph,
            output_format,
            timeout,
        }
    }

    pub fn output_format(&self) -> AssetFormat {
        self.output_format
    }

    /// Start the filter graph on `input` and wait for its first output chunk
    ///
    /// `timeout` bounds the whole run, including the time the sink spends
    /// reading. Cancelling `cancel` kills the process.
    ///
    /// # Errors
    /// * `TransformStartFailed` - launch failed, or the process ended without output
    /// * `DeadlineExceeded` / `Cancelled` - before the first chunk arrived
    pub async fn transform(
        &self,
        input: &Path,
        cancel: CancellationToken,
    ) -> PipelineResult<ProcessedStream> {
        let program = self.tool.program.clone();
        let filter = self.graph.expression();
        let input_arg = input.to_string_lossy().into_owned();

        let mut command = self.tool.command(&[
            ("input", input_arg.as_str()),
            ("filter", filter.as_str()),
            ("format", self.output_format.extension()),
        ]);
        command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::info!(
            input = %input.display(),
            filter = %filter,
            tool = %program,
            "Starting filter graph"
        );

        let mut child = command.spawn().map_err(|e| PipelineError::TransformStartFailed {
            cause: format!("failed to launch {}: {}", program, e),
        })?;

        let stderr_log = child
            .stderr
            .take()
            .map(|s| spawn_log_forwarder(s, program.clone(), Level::WARN));
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::TransformStartFailed {
                cause: "stdout was not captured".to_string(),
            })?;

        let mut reader = ReaderStream::new(stdout);
        let deadline = Instant::now() + self.timeout;

        let first = match next_step(&mut reader, &cancel, deadline).await {
            Step::Chunk(Some(Ok(chunk))) => chunk,
            Step::Chunk(Some(Err(e))) => {
                kill(&mut child, &program).await;
                return Err(PipelineError::TransformStartFailed {
                    cause: format!("reading {} output failed: {}", program, e),
                });
            }
            Step::Chunk(None) => {
                let status = child
                    .wait()
                    .await
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                let tail = collect_tail(stderr_log).await;
                return Err(PipelineError::TransformStartFailed {
                    cause: format!("{} exited with {} before producing output: {}", program, status, tail),
                });
            }
            Step::Cancelled => {
                kill(&mut child, &program).await;
                return Err(PipelineError::Cancelled {
                    stage: RequestState::Processing,
                });
            }
            Step::TimedOut => {
                kill(&mut child, &program).await;
                return Err(PipelineError::DeadlineExceeded {
                    stage: RequestState::Processing,
                    after: self.timeout,
                });
            }
        };

        let stream = async_stream::stream! {
            let mut child = child;
            let mut reader = reader;
            let mut bytes_sent = first.len() as u64;
            yield Ok(first);

            loop {
                match next_step(&mut reader, &cancel, deadline).await {
                    Step::Chunk(Some(Ok(chunk))) => {
                        bytes_sent += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                    Step::Chunk(Some(Err(e))) => {
                        kill(&mut child, &program).await;
                        yield Err(PipelineError::TransformAbortedMidStream {
                            bytes_sent,
                            cause: format!("reading output failed: {}", e),
                        });
                        return;
                    }
                    Step::Chunk(None) => break,
                    Step::Cancelled => {
                        kill(&mut child, &program).await;
                        yield Err(PipelineError::TransformAbortedMidStream {
                            bytes_sent,
                            cause: "cancelled".to_string(),
                        });
                        return;
                    }
                    Step::TimedOut => {
                        kill(&mut child, &program).await;
                        yield Err(PipelineError::TransformAbortedMidStream {
                            bytes_sent,
                            cause: "deadline exceeded".to_string(),
                        });
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::debug!(tool = %program, bytes_sent, "Filter graph finished");
                }
                Ok(status) => {
                    let tail = collect_tail(stderr_log).await;
                    yield Err(PipelineError::TransformAbortedMidStream {
                        bytes_sent,
                        cause: format!("{} exited with {}: {}", program, status, tail),
                    });
                }
                Err(e) => {
                    yield Err(PipelineError::TransformAbortedMidStream {
                        bytes_sent,
                        cause: format!("waiting for {} failed: {}", program, e),
                    });
                }
            }
        };

        Ok(ProcessedStream::new(self.output_format, stream))
    }
}
