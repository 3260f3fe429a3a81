//! Working directory for intermediate and output audio files
//!
//! The pipeline only depends on the [`WorkingDirectory`] trait; retention and
//! cleanup of what accumulates there belong to whoever provides it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::types::AssetFormat;

/// File name of an asset inside a working directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetName(String);

impl AssetName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.0)
    }

    /// Sibling name `<stem>_<suffix>.<ext>`, e.g. for the processed output
    pub fn derived(&self, suffix: &str, format: AssetFormat) -> Self {
        Self(format!("{}_{}.{}", self.stem(), suffix, format.extension()))
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asset naming scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileNaming {
    /// `audio_<HHMMSS>.<ext>`; requests within the same second collide
    TimeOfDay,
    /// `audio_<HHMMSS>_<uuid>.<ext>`
    #[default]
    Unique,
}

/// Storage capability used by the pipeline
pub trait WorkingDirectory: Send + Sync + fmt::Debug {
    /// Reserve a fresh name for a new asset of `format`
    fn allocate(&self, format: AssetFormat) -> AssetName;

    /// Filesystem path of `name` (external tools need real paths)
    fn path_of(&self, name: &AssetName) -> PathBuf;

    /// Create (or truncate) `name` for writing
    fn create(&self, name: &AssetName) -> io::Result<File> {
        File::create(self.path_of(name))
    }

    /// Open `name` for reading
    fn open(&self, name: &AssetName) -> io::Result<File> {
        File::open(self.path_of(name))
    }

    /// Delete `name`
    fn remove(&self, name: &AssetName) -> io::Result<()> {
        std::fs::remove_file(self.path_of(name))
    }
}

/// Working directory backed by a local folder
#[derive(Debug, Clone)]
pub struct LocalWorkingDirectory {
    root: PathBuf,
    naming: FileNaming,
}

impl LocalWorkingDirectory {
    pub fn new(root: impl Into<PathBuf>, naming: FileNaming) -> Self {
        Self {
            root: root.into(),
            naming,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> FileNaming {
        self.naming
    }
}

impl WorkingDirectory for LocalWorkingDirectory {
    fn allocate(&self, format: AssetFormat) -> AssetName {
        let stamp = slowverb_common::time::local_time_of_day_stamp();
        let name = match self.naming {
            FileNaming::TimeOfDay => format!("audio_{}.{}", stamp, format.extension()),
            FileNaming::Unique => format!(
                "audio_{}_{}.{}",
                stamp,
                Uuid::new_v4().simple(),
                format.extension()
            ),
        };
        AssetName(name)
    }

    fn path_of(&self, name: &AssetName) -> PathBuf {
        self.root.join(name.as_str())
    }
}
