//! Source acquirer: locator → local audio asset
//!
//! Runs the configured retrieval tool (yt-dlp by default) with a fresh
//! working-directory path as its output target. No retry is attempted; a
//! non-zero exit or a missing output file is an `AcquisitionFailed`.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use super::command::{collect_tail, spawn_log_forwarder, ToolCommand};
use super::error::{PipelineError, PipelineResult};
use super::probe::probe;
use super::run::RequestState;
use super::types::{AssetFormat, AudioAsset};
use super::workdir::WorkingDirectory;

/// Runs the retrieval tool and describes what it produced
#[derive(Debug, Clone)]
pub struct SourceAcquirer {
    tool: ToolCommand,
    workdir: Arc<dyn WorkingDirectory>,
    timeout: Duration,
}

impl SourceAcquirer {
    pub fn new(tool: ToolCommand, workdir: Arc<dyn WorkingDirectory>, timeout: Duration) -> Self {
        Self {
            tool,
            workdir,
            timeout,
        }
    }

    /// Retrieve `locator` into the working directory as `format`
    ///
    /// # Errors
    /// * `EmptyLocator` - locator is empty or whitespace
    /// * `InvalidLocator` - locator starts with `-`
    /// * `AcquisitionFailed` - tool missing, non-zero exit, no output, unreadable output
    /// * `DeadlineExceeded` / `Cancelled` - the tool was killed
    pub async fn acquire(
        &self,
        locator: &str,
        format: AssetFormat,
        cancel: &CancellationToken,
    ) -> PipelineResult<AudioAsset> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(PipelineError::EmptyLocator);
        }
        if locator.starts_with('-') {
            return Err(PipelineError::InvalidLocator {
                reason: "must not start with '-'".to_string(),
            });
        }

        let name = self.workdir.allocate(format);
        let path = self.workdir.path_of(&name);
        let output = path.to_string_lossy().into_owned();

        let mut command = self.tool.command(&[
            ("locator", locator),
            ("output", output.as_str()),
            ("format", format.extension()),
        ]);
        command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::info!(
            locator = %locator,
            output = %path.display(),
            tool = %self.tool.program,
            "Acquiring source audio"
        );

        let mut child = command.spawn().map_err(|e| {
            PipelineError::acquisition(format!("failed to launch {}: {}", self.tool.program, e))
        })?;

        let stdout_log = child
            .stdout
            .take()
            .map(|s| spawn_log_forwarder(s, self.tool.program.clone(), Level::DEBUG));
        let stderr_log = child
            .stderr
            .take()
            .map(|s| spawn_log_forwarder(s, self.tool.program.clone(), Level::DEBUG));

        let outcome = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(self.timeout) => None,
            _ = cancel.cancelled() => None,
        };

        let status = match outcome {
            Some(status) => status.map_err(|e| {
                PipelineError::acquisition(format!("waiting for {} failed: {}", self.tool.program, e))
            })?,
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(tool = %self.tool.program, error = %e, "Failed to kill retrieval tool");
                }
                return Err(if cancel.is_cancelled() {
                    PipelineError::Cancelled {
                        stage: RequestState::Acquiring,
                    }
                } else {
                    PipelineError::DeadlineExceeded {
                        stage: RequestState::Acquiring,
                        after: self.timeout,
                    }
                });
            }
        };

        let _ = collect_tail(stdout_log).await;
        let stderr_tail = collect_tail(stderr_log).await;

        if !status.success() {
            return Err(PipelineError::acquisition(format!(
                "{} exited with {}: {}",
                self.tool.program, status, stderr_tail
            )));
        }

        if !path.is_file() {
            return Err(PipelineError::acquisition(format!(
                "{} produced no output file at {}",
                self.tool.program,
                path.display()
            )));
        }

        let info = probe(&path).map_err(|e| {
            PipelineError::acquisition(format!("retrieved file is not readable audio: {}", e))
        })?;

        tracing::info!(
            locator = %locator,
            asset = %name,
            sample_rate = info.sample_rate_hz,
            channels = info.channels,
            "Source audio acquired"
        );

        Ok(AudioAsset {
            name,
            path,
            format,
            sample_rate_hz: info.sample_rate_hz,
            channels: info.channels,
            bit_depth: info.bit_depth,
            source_locator: locator.to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::workdir::{FileNaming, LocalWorkingDirectory};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("fixture.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..4_410 {
            writer.write_sample((i % 64) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn acquirer(dir: &Path, script: &str, timeout: Duration) -> SourceAcquirer {
        let workdir = Arc::new(LocalWorkingDirectory::new(dir, FileNaming::Unique));
        // $0 = output path, $1 = locator
        let tool = ToolCommand::new("sh", ["-c", script, "{output}", "{locator}"]);
        SourceAcquirer::new(tool, workdir, timeout)
    }

    #[tokio::test]
    async fn test_acquire_copies_and_probes() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = write_fixture(temp_dir.path());
        let script = format!("cp '{}' \"$0\"", fixture.display());
        let acquirer = acquirer(temp_dir.path(), &script, Duration::from_secs(10));

        let asset = acquirer
            .acquire("  https://example.com/watch?v=abc  ", AssetFormat::Wav, &CancellationToken::new())
            .await
            .unwrap();

        assert!(asset.path.is_file());
        assert!(asset.name.as_str().starts_with("audio_"));
        assert_eq!(asset.source_locator, "https://example.com/watch?v=abc");
        assert_eq!(asset.sample_rate_hz, 44_100);
        assert_eq!(asset.channels, 1);
        assert_eq!(asset.bit_depth, 16);
    }

    #[tokio::test]
    async fn test_empty_locator_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(temp_dir.path(), "exit 0", Duration::from_secs(10));

        let err = acquirer
            .acquire("   ", AssetFormat::Wav, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyLocator));
    }

    #[tokio::test]
    async fn test_option_like_locator_is_rejected_before_launch() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("ran");
        let script = format!("touch '{}'", marker.display());
        let acquirer = acquirer(temp_dir.path(), &script, Duration::from_secs(10));

        let err = acquirer
            .acquire(" --exec=touch /tmp/x ", AssetFormat::Mp3, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidLocator { .. }), "{:?}", err);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(
            temp_dir.path(),
            "echo 'ERROR: Unsupported URL' >&2; exit 1",
            Duration::from_secs(10),
        );

        let err = acquirer
            .acquire("not-a-url", AssetFormat::Mp3, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::AcquisitionFailed { cause } => {
                assert!(cause.contains("Unsupported URL"), "{}", cause)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_output_file() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(temp_dir.path(), "exit 0", Duration::from_secs(10));

        let err = acquirer
            .acquire("https://example.com/v", AssetFormat::Wav, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::AcquisitionFailed { cause } => assert!(cause.contains("no output file")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_output_file() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(
            temp_dir.path(),
            "echo 'not audio' > \"$0\"",
            Duration::from_secs(10),
        );

        let err = acquirer
            .acquire("https://example.com/v", AssetFormat::Wav, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AcquisitionFailed { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let temp_dir = TempDir::new().unwrap();
        let workdir = Arc::new(LocalWorkingDirectory::new(temp_dir.path(), FileNaming::Unique));
        let tool = ToolCommand::new("/nonexistent/slowverb/yt-dlp", ["{locator}"]);
        let acquirer = SourceAcquirer::new(tool, workdir, Duration::from_secs(10));

        let err = acquirer
            .acquire("https://example.com/v", AssetFormat::Mp3, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::AcquisitionFailed { cause } => assert!(cause.contains("failed to launch")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_tool() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(temp_dir.path(), "sleep 30", Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = acquirer
            .acquire("https://example.com/v", AssetFormat::Wav, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::DeadlineExceeded {
                stage: RequestState::Acquiring,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_kills_tool() {
        let temp_dir = TempDir::new().unwrap();
        let acquirer = acquirer(temp_dir.path(), "sleep 30", Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = acquirer
            .acquire("https://example.com/v", AssetFormat::Wav, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Cancelled {
                stage: RequestState::Acquiring
            }
        ));
    }
}
