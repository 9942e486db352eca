//! Result artifacts.
//!
//! A finished column store is encoded as CSV (nested cells as compact JSON
//! text), JSONL (nested cells as native JSON) or Parquet (list columns) and
//! written next to a manifest describing every column and its lineage.
//! Encoding is a pure function of the store, so identical runs produce
//! identical bytes.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ArtifactFormat;
use crate::error::{Result, ResultExt};
use crate::storage::{ArtifactSink, ResultRef};
use crate::store::{ColumnData, ColumnLineage, ColumnStore};
use crate::types::{ColumnKind, FileId};
use crate::utils::json_to_cell_text;

/// One column as described in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestColumn {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<ColumnLineage>,
}

/// Description of a result artifact. Contains no timestamps so reruns
/// produce identical manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultManifest {
    pub file_id: FileId,
    pub format: ArtifactFormat,
    pub rows: usize,
    pub columns: Vec<ManifestColumn>,
    /// Fitted vocabulary of each vectorized column, in vector index order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vocabularies: BTreeMap<String, Vec<String>>,
}

impl ResultManifest {
    pub fn new(
        file_id: FileId,
        format: ArtifactFormat,
        store: &ColumnStore,
        vocabularies: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            file_id,
            format,
            rows: store.rows(),
            columns: store
                .columns()
                .iter()
                .map(|column| ManifestColumn {
                    name: column.name.clone(),
                    kind: column.kind(),
                    lineage: column.lineage.clone(),
                })
                .collect(),
            vocabularies,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

/// Build a DataFrame for CSV output. Derived cells become JSON text.
fn artifact_frame(store: &ColumnStore) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(store.columns().len());
    for column in store.columns() {
        let name = PlSmallStr::from(column.name.as_str());
        let series = match &column.data {
            ColumnData::Passthrough(series) => series.clone().with_name(name),
            ColumnData::Text(cells) => Series::new(name, cells),
            data => {
                let cells = (0..store.rows())
                    .map(|row| data.cell_json(row).map(|value| json_to_cell_text(&value)))
                    .collect::<Result<Vec<Option<String>>>>()?;
                Series::new(name, cells)
            }
        };
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

fn string_lists<'a, I>(name: PlSmallStr, rows: usize, cells: I) -> Series
where
    I: Iterator<Item = Option<Vec<&'a str>>>,
{
    let mut builder = ListStringChunkedBuilder::new(name, rows, rows * 4);
    for cell in cells {
        match cell {
            Some(values) => builder.append_values_iter(values.into_iter()),
            None => builder.append_null(),
        }
    }
    builder.finish().into_series()
}

/// Build a DataFrame for Parquet output. Token, tag and vector cells become
/// list columns; entity cells stay JSON text. Row error markers become nulls.
fn columnar_frame(store: &ColumnStore) -> Result<DataFrame> {
    let rows = store.rows();
    let mut columns: Vec<Column> = Vec::with_capacity(store.columns().len());
    for column in store.columns() {
        let name = PlSmallStr::from(column.name.as_str());
        let series = match &column.data {
            ColumnData::Passthrough(series) => series.clone().with_name(name),
            ColumnData::Text(cells) => Series::new(name, cells),
            ColumnData::Tokens(cells) => string_lists(
                name,
                rows,
                cells.iter().map(|cell| {
                    cell.as_ref()
                        .ok()
                        .map(|tokens| tokens.iter().map(String::as_str).collect())
                }),
            ),
            ColumnData::Tags(cells) => string_lists(
                name,
                rows,
                cells.iter().map(|cell| {
                    cell.as_ref()
                        .ok()
                        .map(|tags| tags.iter().map(|tag| tag.as_str()).collect())
                }),
            ),
            ColumnData::Vectors(cells) => {
                let width = cells
                    .iter()
                    .find_map(|cell| cell.as_ref().ok().map(Vec::len))
                    .unwrap_or(0);
                let mut builder = ListPrimitiveChunkedBuilder::<Float64Type>::new(
                    name,
                    rows,
                    rows * width,
                    DataType::Float64,
                );
                for cell in cells {
                    match cell {
                        Ok(vector) => builder.append_slice(vector),
                        Err(_) => builder.append_null(),
                    }
                }
                builder.finish().into_series()
            }
            ColumnData::Entities(cells) => {
                let cells = cells
                    .iter()
                    .map(|cell| {
                        cell.as_ref()
                            .ok()
                            .map(serde_json::to_string)
                            .transpose()
                    })
                    .collect::<std::result::Result<Vec<Option<String>>, _>>()?;
                Series::new(name, cells)
            }
        };
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Encode `store` in `format`.
pub fn encode(store: &ColumnStore, format: ArtifactFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        ArtifactFormat::Csv => {
            let mut df = artifact_frame(store)?;
            CsvWriter::new(&mut buffer)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .finish(&mut df)?;
        }
        ArtifactFormat::Jsonl => {
            for row in 0..store.rows() {
                let mut record = Map::new();
                for column in store.columns() {
                    record.insert(column.name.clone(), column.data.cell_json(row)?);
                }
                serde_json::to_writer(&mut buffer, &Value::Object(record))?;
                buffer.write_all(b"\n")?;
            }
        }
        ArtifactFormat::Parquet => {
            let mut df = columnar_frame(store)?;
            ParquetWriter::new(&mut buffer).finish(&mut df)?;
        }
    }
    Ok(buffer)
}

/// Write `bytes` to `path` via a temporary file, synced to disk before the
/// rename so the destination never holds a partial file after a crash.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).context(format!("Failed to create {}", tmp.display()))?;
    file.write_all(bytes)
        .context(format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .context(format!("Failed to sync {}", tmp.display()))?;
    drop(file);

    std::fs::rename(&tmp, path).context(format!("Failed to move {}", path.display()))?;
    Ok(())
}

/// Writes `processed_{file_id}.{csv|jsonl|parquet}` and
/// `processed_{file_id}.manifest.json` into a directory.
#[derive(Debug, Clone)]
pub struct ResultDirectory {
    dir: PathBuf,
}

impl ResultDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, file_id: &FileId, format: ArtifactFormat) -> PathBuf {
        self.dir
            .join(format!("processed_{}.{}", file_id, format.extension()))
    }

    pub fn manifest_path(&self, file_id: &FileId) -> PathBuf {
        self.dir.join(format!("processed_{}.manifest.json", file_id))
    }
}

impl ArtifactSink for ResultDirectory {
    fn write(
        &self,
        file_id: &FileId,
        store: &ColumnStore,
        manifest: &ResultManifest,
    ) -> Result<ResultRef> {
        std::fs::create_dir_all(&self.dir)
            .context(format!("Failed to create {}", self.dir.display()))?;

        let path = self.artifact_path(file_id, manifest.format);
        write_atomic(&path, &encode(store, manifest.format)?)?;

        let manifest_path = self.manifest_path(file_id);
        write_atomic(&manifest_path, &serde_json::to_vec_pretty(manifest)?)?;

        info!("Result saved: {}", path.display());
        Ok(ResultRef {
            location: path.display().to_string(),
            manifest: Some(manifest_path.display().to_string()),
            format: manifest.format,
            rows: manifest.rows,
            columns: manifest.column_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowError;
    use crate::types::TransformationKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> ColumnStore {
        let mut store = ColumnStore::from_text_columns([(
            "text",
            vec![Some("Hi, there".to_string()), None],
        )])
        .unwrap();
        store
            .write_range(
                "text_tokens",
                0,
                ColumnData::Tokens(vec![
                    Ok(vec!["Hi".to_string(), ",".to_string(), "there".to_string()]),
                    Err(RowError::new(1, "null text")),
                ]),
                ColumnLineage {
                    source: "text".to_string(),
                    step: 0,
                    transformation: TransformationKind::Tokenization,
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn test_jsonl_native_values() {
        let bytes = encode(&store(), ArtifactFormat::Jsonl).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"text":"Hi, there","text_tokens":["Hi",",","there"]}"#,
                r#"{"text":null,"text_tokens":{"error":"null text"}}"#,
            ]
        );
    }

    #[test]
    fn test_csv_nested_cells_as_json_text() {
        let bytes = encode(&store(), ArtifactFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("text,text_tokens"));
        assert_eq!(
            lines.next(),
            Some(r#""Hi, there","[""Hi"","","",""there""]""#)
        );
    }

    #[test]
    fn test_parquet_keeps_lists_native() {
        let mut store = store();
        store
            .write_range(
                "text_tokens_count",
                0,
                ColumnData::Vectors(vec![Ok(vec![1.0, 0.0, 2.0]), Err(RowError::new(1, "null text"))]),
                ColumnLineage {
                    source: "text_tokens".to_string(),
                    step: 1,
                    transformation: TransformationKind::TextVectorization,
                },
            )
            .unwrap();

        let bytes = encode(&store, ArtifactFormat::Parquet).unwrap();
        let df = ParquetReader::new(std::io::Cursor::new(bytes)).finish().unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["text", "text_tokens", "text_tokens_count"]);

        let text = df.column("text").unwrap().as_materialized_series().str().unwrap();
        assert_eq!(text.get(0), Some("Hi, there"));
        assert_eq!(text.get(1), None);

        let tokens = df.column("text_tokens").unwrap().as_materialized_series().list().unwrap();
        let first = tokens.get_as_series(0).unwrap();
        let first: Vec<&str> = first.str().unwrap().into_no_null_iter().collect();
        assert_eq!(first, vec!["Hi", ",", "there"]);
        assert!(tokens.get_as_series(1).is_none());

        let vectors = df
            .column("text_tokens_count")
            .unwrap()
            .as_materialized_series()
            .list()
            .unwrap();
        let first = vectors.get_as_series(0).unwrap();
        let first: Vec<f64> = first.f64().unwrap().into_no_null_iter().collect();
        assert_eq!(first, vec![1.0, 0.0, 2.0]);
        assert!(vectors.get_as_series(1).is_none());
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(!dir.path().join("status.json.tmp").exists());
    }

    #[test]
    fn test_result_directory_writes_artifact_and_manifest() {
        let dir = TempDir::new().unwrap();
        let sink = ResultDirectory::new(dir.path().join("out"));
        let file_id = FileId::parse("f1").unwrap();
        let store = store();
        let manifest = ResultManifest::new(file_id.clone(), ArtifactFormat::Jsonl, &store, BTreeMap::new());

        let result = sink.write(&file_id, &store, &manifest).unwrap();
        assert_eq!(result.rows, 2);
        assert_eq!(result.columns, vec!["text", "text_tokens"]);
        assert!(result.location.ends_with("processed_f1.jsonl"));

        let written: ResultManifest =
            serde_json::from_slice(&std::fs::read(sink.manifest_path(&file_id)).unwrap()).unwrap();
        assert_eq!(written, manifest);
        assert_eq!(
            written.columns[1].lineage.as_ref().map(|l| l.transformation),
            Some(TransformationKind::Tokenization)
        );
        assert!(!dir.path().join("out/processed_f1.jsonl.tmp").exists());
    }
}
