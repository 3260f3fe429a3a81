//! Service configuration for slowverb-server
//!
//! Loaded from `slowverb.toml` with every field optional; missing sections
//! fall back to the defaults below: yt-dlp for retrieval and ffmpeg for the
//! `asetrate=40000,aecho=0.8:0.9:1000:0.1` filter graph.

use serde::{Deserialize, Serialize};
use slowverb_common::config::{load_toml_config, resolve_config_path, LoggingConfig};
use slowverb_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{
    AssetFormat, EchoFilter, EffectParameters, FileNaming, FilterGraph, LocalWorkingDirectory,
    OverflowPolicy, PipelineOptions, PipelineOrchestrator, SourceAcquirer, StreamingTransformer,
    ToolCommand, TransformStrategy,
};

/// Config file name looked up under the platform config dir
pub const CONFIG_FILE_NAME: &str = "slowverb.toml";

/// Root of `slowverb.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub working_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    pub retrieval: RetrievalConfig,
    pub filter_graph: FilterGraphConfig,
}

/// `[pipeline]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub strategy: TransformStrategy,
    pub file_naming: FileNaming,
    pub keep_intermediate_files: bool,
    pub acquire_timeout_secs: u64,
    pub transform_timeout_secs: u64,
    pub effects: EffectsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: TransformStrategy::default(),
            file_naming: FileNaming::default(),
            keep_intermediate_files: true,
            acquire_timeout_secs: 300,
            transform_timeout_secs: 600,
            effects: EffectsConfig::default(),
        }
    }
}

/// `[pipeline.effects]`, raw values validated into [`EffectParameters`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub decimation_factor: usize,
    pub echo_gain_numerator: i32,
    pub echo_gain_denominator: i32,
    pub overflow: OverflowPolicy,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            decimation_factor: 2,
            echo_gain_numerator: 1,
            echo_gain_denominator: 2,
            overflow: OverflowPolicy::Wrap,
        }
    }
}

/// `[retrieval]`: placeholders `{locator}`, `{output}`, `{format}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            args: [
                "--no-playlist",
                "--extract-audio",
                "--audio-format",
                "{format}",
                "--postprocessor-args",
                "ExtractAudio:-ac 1",
                "-o",
                "{output}",
                "--",
                "{locator}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// `[filter_graph]`: placeholders `{input}`, `{filter}`, `{format}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterGraphConfig {
    pub program: String,
    pub args: Vec<String>,
    pub output_format: AssetFormat,
    pub sample_rate_hz: u32,
    pub echo: EchoFilter,
}

impl Default for FilterGraphConfig {
    fn default() -> Self {
        let graph = FilterGraph::default();
        Self {
            program: "ffmpeg".to_string(),
            args: [
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "{input}",
                "-filter:a",
                "{filter}",
                "-vn",
                "-f",
                "{format}",
                "pipe:1",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            output_format: AssetFormat::Mp3,
            sample_rate_hz: graph.sample_rate_hz,
            echo: graph.echo,
        }
    }
}

impl FilterGraphConfig {
    pub fn graph(&self) -> FilterGraph {
        FilterGraph {
            sample_rate_hz: self.sample_rate_hz,
            echo: self.echo,
        }
    }
}

impl ServiceConfig {
    /// Resolve the config path (CLI → `SLOWVERB_CONFIG` → platform default),
    /// load it with graceful degradation, and validate it
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: Self = match resolve_config_path(cli_path, CONFIG_FILE_NAME) {
            Some(path) => load_toml_config(&path)?,
            None => {
                tracing::warn!("No config directory on this platform, using compiled defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no pipeline could run with
    pub fn validate(&self) -> Result<()> {
        self.effect_parameters()?;

        if self.pipeline.acquire_timeout_secs == 0 {
            return Err(Error::Config("acquire_timeout_secs must be positive".to_string()));
        }
        if self.pipeline.transform_timeout_secs == 0 {
            return Err(Error::Config("transform_timeout_secs must be positive".to_string()));
        }
        if self.retrieval.program.trim().is_empty() {
            return Err(Error::Config("retrieval.program must not be empty".to_string()));
        }
        if self.filter_graph.program.trim().is_empty() {
            return Err(Error::Config("filter_graph.program must not be empty".to_string()));
        }
        if self.filter_graph.sample_rate_hz == 0 {
            return Err(Error::Config("filter_graph.sample_rate_hz must be positive".to_string()));
        }
        Ok(())
    }

    pub fn effect_parameters(&self) -> Result<EffectParameters> {
        let effects = &self.pipeline.effects;
        EffectParameters::from_raw(
            effects.decimation_factor,
            effects.echo_gain_numerator,
            effects.echo_gain_denominator,
            effects.overflow,
        )
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        Ok(PipelineOptions {
            strategy: self.pipeline.strategy,
            effects: self.effect_parameters()?,
            transform_timeout: Duration::from_secs(self.pipeline.transform_timeout_secs),
            keep_intermediate_files: self.pipeline.keep_intermediate_files,
        })
    }

    /// Wire the pipeline over `working_dir`
    ///
    /// `shutdown` is the parent of every request's cancellation token.
    pub fn build_orchestrator(
        &self,
        working_dir: &Path,
        shutdown: CancellationToken,
    ) -> Result<PipelineOrchestrator> {
        let workdir = Arc::new(LocalWorkingDirectory::new(
            working_dir,
            self.pipeline.file_naming,
        ));

        let acquirer = SourceAcquirer::new(
            ToolCommand::new(self.retrieval.program.clone(), self.retrieval.args.clone()),
            workdir.clone(),
            Duration::from_secs(self.pipeline.acquire_timeout_secs),
        );

        let transformer = StreamingTransformer::new(
            ToolCommand::new(self.filter_graph.program.clone(), self.filter_graph.args.clone()),
            self.filter_graph.graph(),
            self.filter_graph.output_format,
            Duration::from_secs(self.pipeline.transform_timeout_secs),
        );

        Ok(PipelineOrchestrator::new(
            self.pipeline_options()?,
            acquirer,
            transformer,
            workdir,
            shutdown,
        ))
    }
}
