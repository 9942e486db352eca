//! Durable job records as `processing_{file_id}.json` files.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, ResultExt};
use crate::jobs::JobRecord;
use crate::storage::artifact::write_atomic;
use crate::types::FileId;

const PREFIX: &str = "processing_";
const SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub(crate) struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context(format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, file_id: &FileId) -> PathBuf {
        self.dir.join(format!("{}{}{}", PREFIX, file_id, SUFFIX))
    }

    pub fn save(&self, record: &JobRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path_for(&record.status.file_id), &bytes)
    }

    /// Every record in the directory. Unreadable files are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<JobRecord>> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir).context("Failed to list status records")? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(PREFIX) && name.ends_with(SUFFIX));
            if !is_record {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable status record {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| a.status.file_id.cmp(&b.status.file_id));
        Ok(records)
    }
}

/// Read the persisted record for `file_id` without touching it. Returns
/// None when no record exists.
pub fn load_record(dir: &Path, file_id: &FileId) -> Result<Option<JobRecord>> {
    let path = dir.join(format!("{}{}{}", PREFIX, file_id, SUFFIX));
    if !path.exists() {
        return Ok(None);
    }
    read_record(&path).map(Some)
}

fn read_record(path: &Path) -> Result<JobRecord> {
    let bytes = std::fs::read(path).context(format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PipelineConfig;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_all() {
        let dir = TempDir::new().unwrap();
        let store = StatusStore::open(dir.path().join("status")).unwrap();
        let record = JobRecord::queued(FileId::parse("f1").unwrap(), PipelineConfig::new("text"));

        store.save(&record).unwrap();
        std::fs::write(dir.path().join("status/processing_bad.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("status/notes.txt"), "ignore me").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![record]);
        assert!(store.path_for(&FileId::parse("f1").unwrap()).ends_with("processing_f1.json"));

        let status_dir = dir.path().join("status");
        let found = load_record(&status_dir, &FileId::parse("f1").unwrap()).unwrap();
        assert_eq!(found.map(|r| r.status.state), Some(crate::jobs::JobState::Queued));
        assert!(load_record(&status_dir, &FileId::parse("f9").unwrap()).unwrap().is_none());
    }
}
