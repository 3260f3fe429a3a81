//! Test Helper Utilities
//!
//! Shared utilities for testing slowverb-server. External tools are replaced
//! by `sh -c` scripts rendered through the same argument templates as the
//! real ones.

#![allow(dead_code)]

pub mod audio_generator;
pub mod log_capture;

pub use audio_generator::{generate_test_wav, tone_samples, AudioConfig};
pub use log_capture::LogCapture;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use slowverb_server::pipeline::{
    AssetFormat, EffectParameters, FileNaming, FilterGraph, LocalWorkingDirectory,
    PipelineOptions, PipelineOrchestrator, SourceAcquirer, StreamingTransformer, ToolCommand,
    TransformStrategy,
};

/// Retrieval tool stand-in: runs `script` with `$0` = output path, `$1` = locator
pub fn retrieval_script(script: &str) -> ToolCommand {
    ToolCommand::new("sh", ["-c", script, "{output}", "{locator}"])
}

/// Retrieval tool that copies `fixture` to the requested output path
pub fn copying_retrieval(fixture: &Path) -> ToolCommand {
    retrieval_script(&format!("cp '{}' \"$0\"", fixture.display()))
}

/// Filter-graph stand-in: runs `script` with `$0` = input, `$1` = filter, `$2` = format
pub fn filter_script(script: &str) -> ToolCommand {
    ToolCommand::new("sh", ["-c", script, "{input}", "{filter}", "{format}"])
}

/// Filter graph that echoes its input file to stdout unchanged
pub fn passthrough_filter() -> ToolCommand {
    filter_script("cat \"$0\"")
}

/// Builder for an orchestrator over a temporary working directory
pub struct TestPipeline {
    pub strategy: TransformStrategy,
    pub retrieval: ToolCommand,
    pub filter: ToolCommand,
    pub effects: EffectParameters,
    pub acquire_timeout: Duration,
    pub transform_timeout: Duration,
    pub keep_intermediate_files: bool,
}

impl TestPipeline {
    pub fn new(strategy: TransformStrategy, retrieval: ToolCommand) -> Self {
        Self {
            strategy,
            retrieval,
            filter: passthrough_filter(),
            effects: EffectParameters::default(),
            acquire_timeout: Duration::from_secs(30),
            transform_timeout: Duration::from_secs(30),
            keep_intermediate_files: true,
        }
    }

    pub fn filter(mut self, filter: ToolCommand) -> Self {
        self.filter = filter;
        self
    }

    pub fn transform_timeout(mut self, timeout: Duration) -> Self {
        self.transform_timeout = timeout;
        self
    }

    pub fn keep_intermediate_files(mut self, keep: bool) -> Self {
        self.keep_intermediate_files = keep;
        self
    }

    pub fn build(self, working_dir: &Path) -> PipelineOrchestrator {
        self.build_with_shutdown(working_dir, CancellationToken::new())
    }

    pub fn build_with_shutdown(
        self,
        working_dir: &Path,
        shutdown: CancellationToken,
    ) -> PipelineOrchestrator {
        let workdir = Arc::new(LocalWorkingDirectory::new(working_dir, FileNaming::Unique));
        let acquirer = SourceAcquirer::new(self.retrieval, workdir.clone(), self.acquire_timeout);
        let transformer = StreamingTransformer::new(
            self.filter,
            FilterGraph::default(),
            AssetFormat::Mp3,
            self.transform_timeout,
        );
        let options = PipelineOptions {
            strategy: self.strategy,
            effects: self.effects,
            transform_timeout: self.transform_timeout,
            keep_intermediate_files: self.keep_intermediate_files,
        };
        PipelineOrchestrator::new(options, acquirer, transformer, workdir, shutdown)
    }
}

/// Names of the regular files in `dir`
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
