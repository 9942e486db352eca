//! In-process storage for tests and embedding.

use parking_lot::{Mutex, RwLock};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::storage::artifact::encode;
use crate::storage::{ArtifactSink, DatasetSource, ResultManifest, ResultRef};
use crate::store::{ColumnStore, DatasetSchema};
use crate::types::FileId;

/// Datasets held in memory, keyed by file id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDatasets {
    datasets: Arc<RwLock<HashMap<FileId, DataFrame>>>,
}

impl InMemoryDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_id: FileId, df: DataFrame) {
        self.datasets.write().insert(file_id, df);
    }

    pub fn with(self, file_id: FileId, df: DataFrame) -> Self {
        self.insert(file_id, df);
        self
    }

    fn get(&self, file_id: &FileId) -> Result<DataFrame> {
        self.datasets
            .read()
            .get(file_id)
            .cloned()
            .ok_or_else(|| PipelineError::DatasetNotFound(file_id.to_string()))
    }
}

impl DatasetSource for InMemoryDatasets {
    fn schema(&self, file_id: &FileId) -> Result<DatasetSchema> {
        self.get(file_id).map(|df| DatasetSchema::from_dataframe(&df))
    }

    fn load(&self, file_id: &FileId) -> Result<DataFrame> {
        self.get(file_id)
    }
}

/// An artifact captured by [`MemoryArtifacts`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub manifest: ResultManifest,
    pub bytes: Vec<u8>,
}

/// Artifact sink that keeps encoded artifacts in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryArtifacts {
    artifacts: Arc<Mutex<HashMap<FileId, StoredArtifact>>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_id: &FileId) -> Option<StoredArtifact> {
        self.artifacts.lock().get(file_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemoryArtifacts {
    fn write(
        &self,
        file_id: &FileId,
        store: &ColumnStore,
        manifest: &ResultManifest,
    ) -> Result<ResultRef> {
        let bytes = encode(store, manifest.format)?;
        let location = format!("memory://processed_{}.{}", file_id, manifest.format.extension());
        self.artifacts.lock().insert(
            file_id.clone(),
            StoredArtifact {
                manifest: manifest.clone(),
                bytes,
            },
        );
        Ok(ResultRef {
            location,
            manifest: None,
            format: manifest.format,
            rows: manifest.rows,
            columns: manifest.column_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactFormat;
    use polars::df;
    use std::collections::BTreeMap;

    #[test]
    fn test_datasets_round_trip() {
        let id = FileId::parse("f1").unwrap();
        let datasets = InMemoryDatasets::new().with(id.clone(), df!["text" => ["a"]].unwrap());

        assert_eq!(datasets.load(&id).unwrap().height(), 1);
        assert!(datasets.schema(&id).unwrap().contains("text"));
        let missing = FileId::parse("nope").unwrap();
        assert!(matches!(
            datasets.schema(&missing),
            Err(PipelineError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_memory_artifacts_capture_bytes() {
        let id = FileId::parse("f1").unwrap();
        let store = ColumnStore::from_text_columns([("text", vec![Some("a".to_string())])]).unwrap();
        let manifest = ResultManifest::new(id.clone(), ArtifactFormat::Jsonl, &store, BTreeMap::new());

        let sink = MemoryArtifacts::new();
        let result = sink.write(&id, &store, &manifest).unwrap();
        assert_eq!(result.location, "memory://processed_f1.jsonl");
        assert_eq!(sink.get(&id).unwrap().bytes, b"{\"text\":\"a\"}\n".to_vec());
    }
}
