//! Storage collaborators.
//!
//! The engine reads datasets through a [`DatasetSource`] and hands finished
//! column stores to an [`ArtifactSink`]. Local-directory implementations
//! live in [`local`] and [`artifact`]; [`memory`] holds in-process versions
//! for tests and embedding.

pub mod artifact;
pub mod local;
pub mod memory;

pub use artifact::{ManifestColumn, ResultDirectory, ResultManifest};
pub use local::UploadDirectory;
pub use memory::{InMemoryDatasets, MemoryArtifacts};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::config::ArtifactFormat;
use crate::error::Result;
use crate::store::{ColumnStore, DatasetSchema};
use crate::types::FileId;

/// Source of uploaded datasets keyed by file id.
pub trait DatasetSource: Send + Sync {
    /// Column names and kinds, used to validate a pipeline before a job is
    /// created.
    fn schema(&self, file_id: &FileId) -> Result<DatasetSchema>;

    /// Read the full dataset.
    fn load(&self, file_id: &FileId) -> Result<DataFrame>;
}

/// Destination for transformed datasets.
pub trait ArtifactSink: Send + Sync {
    fn write(
        &self,
        file_id: &FileId,
        store: &ColumnStore,
        manifest: &ResultManifest,
    ) -> Result<ResultRef>;
}

/// Where a completed job's artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRef {
    /// Path (or key, for non-file sinks) of the artifact.
    pub location: String,
    /// Path of the manifest, when one was written alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    pub format: ArtifactFormat,
    pub rows: usize,
    pub columns: Vec<String>,
}
