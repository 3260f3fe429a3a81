//! Audio acquisition-and-effects pipeline
//!
//! locator → [`SourceAcquirer`] → local asset → either
//! [`codec::decode`] → [`effects::apply`] → [`codec::encode`] (in-process), or
//! [`StreamingTransformer`] (external filter graph) → [`ProcessedStream`].
//! [`PipelineOrchestrator`] sequences the stages and owns error reporting.

pub mod acquirer;
pub mod codec;
pub mod command;
pub mod effects;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod run;
pub mod stream;
pub mod transformer;
pub mod types;
pub mod workdir;

pub use acquirer::SourceAcquirer;
pub use command::ToolCommand;
pub use effects::{EchoGain, EffectParameters, OverflowPolicy};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{PipelineOptions, PipelineOrchestrator, TransformStrategy};
pub use run::{RequestRun, RequestState, StateTransition};
pub use stream::ProcessedStream;
pub use transformer::{EchoFilter, FilterGraph, StreamingTransformer};
pub use types::{AssetFormat, AudioAsset, PcmAudio, SampleBuffer};
pub use workdir::{AssetName, FileNaming, LocalWorkingDirectory, WorkingDirectory};
