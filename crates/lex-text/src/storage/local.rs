//! Upload directory dataset source.
//!
//! Datasets are stored as `{file_id}.{ext}` or `{file_id}_{original name}.{ext}`.
//! Supported formats: `.csv`, tab-delimited `.tsv`/`.txt`, line-delimited
//! `.jsonl`/`.ndjson`, JSON arrays (`.json`), `.parquet` and the first
//! worksheet of `.xlsx`/`.xlsm`/`.xls`/`.ods` workbooks.

use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result, ResultExt};
use crate::storage::DatasetSource;
use crate::store::DatasetSchema;
use crate::types::FileId;
use crate::utils::extension_of;

/// Rows sampled for type inference, and read when only the schema is needed.
const INFER_SCHEMA_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatasetFormat {
    Delimited(u8),
    JsonLines,
    JsonArray,
    Parquet,
    Spreadsheet,
}

impl DatasetFormat {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "csv" => Some(Self::Delimited(b',')),
            "tsv" | "txt" => Some(Self::Delimited(b'\t')),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "json" => Some(Self::JsonArray),
            "parquet" => Some(Self::Parquet),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Cell-to-column conversion for one worksheet column. Empty cells are nulls;
/// a column that is not uniformly numeric or boolean becomes text.
fn sheet_column(name: &str, cells: &[&Data]) -> Series {
    let name = PlSmallStr::from(name);
    let filled = || cells.iter().filter(|cell| !matches!(cell, Data::Empty));

    if filled().next().is_some() && filled().all(|cell| matches!(cell, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }
    if filled().next().is_some() && filled().all(|cell| matches!(cell, Data::Int(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(n) => Some(*n),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }
    if filled().next().is_some()
        && filled().all(|cell| matches!(cell, Data::Int(_) | Data::Float(_)))
    {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(n) => Some(*n as f64),
                Data::Float(x) => Some(*x),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|cell| match cell {
            Data::Empty => None,
            other => Some(other.to_string()),
        })
        .collect();
    Series::new(name, values)
}

/// First row is the header; blank header cells are named `column_{n}`.
fn sheet_frame(range: &Range<Data>, n_rows: Option<usize>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.take(n_rows.unwrap_or(usize::MAX)).collect();

    let columns = header
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let name = match cell {
                Data::Empty => format!("column_{}", index + 1),
                other => other.to_string().trim().to_string(),
            };
            let cells: Vec<&Data> = body
                .iter()
                .map(|row| row.get(index).unwrap_or(&Data::Empty))
                .collect();
            sheet_column(&name, &cells).into()
        })
        .collect::<Vec<Column>>();
    Ok(DataFrame::new(columns)?)
}

fn read_spreadsheet(file_id: &FileId, path: &Path, n_rows: Option<usize>) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::DatasetNotFound(format!("{} (workbook has no sheets)", file_id)))??;
    sheet_frame(&range, n_rows)
}

/// Reads uploaded datasets from a local directory.
#[derive(Debug, Clone)]
pub struct UploadDirectory {
    dir: PathBuf,
}

impl UploadDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find the upload for `file_id`. An exact `{file_id}.{ext}` wins over
    /// `{file_id}_*` names; ties are broken by file name.
    pub fn locate(&self, file_id: &FileId) -> Result<PathBuf> {
        let not_found = || PipelineError::DatasetNotFound(file_id.to_string());
        if !self.dir.is_dir() {
            return Err(not_found());
        }

        let prefix = format!("{}_", file_id);
        let mut exact = Vec::new();
        let mut prefixed = Vec::new();
        for entry in std::fs::read_dir(&self.dir).context("Failed to list uploads")? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == file_id.as_str() {
                exact.push(path);
            } else if stem.starts_with(&prefix) {
                prefixed.push(path);
            }
        }

        exact.sort();
        prefixed.sort();
        exact.into_iter().chain(prefixed).next().ok_or_else(not_found)
    }

    fn format_of(file_id: &FileId, path: &Path) -> Result<DatasetFormat> {
        let extension = extension_of(path).unwrap_or_default();
        DatasetFormat::from_extension(&extension).ok_or_else(|| PipelineError::UnsupportedFormat {
            file_id: file_id.to_string(),
            extension,
        })
    }

    /// Read a dataset file. `n_rows` limits delimited and spreadsheet reads.
    pub fn read(file_id: &FileId, path: &Path, n_rows: Option<usize>) -> Result<DataFrame> {
        let format = Self::format_of(file_id, path)?;
        debug!("Reading {} as {:?}", path.display(), format);

        let df = match format {
            DatasetFormat::Delimited(separator) => CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
                .with_n_rows(n_rows)
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(separator)
                        .with_quote_char(Some(b'"')),
                )
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?,
            DatasetFormat::JsonLines => JsonLineReader::new(File::open(path)?).finish()?,
            DatasetFormat::JsonArray => JsonReader::new(File::open(path)?).finish()?,
            DatasetFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
            DatasetFormat::Spreadsheet => read_spreadsheet(file_id, path, n_rows)?,
        };
        Ok(df)
    }
}

impl DatasetSource for UploadDirectory {
    fn schema(&self, file_id: &FileId) -> Result<DatasetSchema> {
        let path = self.locate(file_id)?;
        let n_rows = match Self::format_of(file_id, &path)? {
            DatasetFormat::Delimited(_) | DatasetFormat::Spreadsheet => Some(INFER_SCHEMA_ROWS),
            _ => None,
        };
        let df = Self::read(file_id, &path, n_rows)
            .context(format!("Failed to read schema of '{}'", file_id))?;
        Ok(DatasetSchema::from_dataframe(&df))
    }

    fn load(&self, file_id: &FileId) -> Result<DataFrame> {
        let path = self.locate(file_id)?;
        Self::read(file_id, &path, None).context(format!("Failed to load '{}'", file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnKind;
    use tempfile::TempDir;

    fn id(s: &str) -> FileId {
        FileId::parse(s).unwrap()
    }

    #[test]
    fn test_locate_prefers_exact_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f1_reviews.csv"), "a\nx\n").unwrap();
        std::fs::write(dir.path().join("f1.csv"), "a\nx\n").unwrap();
        std::fs::write(dir.path().join("f10.csv"), "a\nx\n").unwrap();

        let uploads = UploadDirectory::new(dir.path());
        assert_eq!(uploads.locate(&id("f1")).unwrap(), dir.path().join("f1.csv"));
        assert_eq!(uploads.locate(&id("f10")).unwrap(), dir.path().join("f10.csv"));
        assert!(matches!(
            uploads.locate(&id("f2")),
            Err(PipelineError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_prefixed_upload_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("abc_my data.csv"),
            "review,stars\n\"good, really\",5\nbad,1\n",
        )
        .unwrap();

        let uploads = UploadDirectory::new(dir.path());
        let schema = uploads.schema(&id("abc")).unwrap();
        assert_eq!(schema.kind_of("review"), Some(ColumnKind::Text));
        assert_eq!(schema.kind_of("stars"), Some(ColumnKind::Passthrough));

        let df = uploads.load(&id("abc")).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_tsv_and_jsonl() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("t.tsv"), "text\tn\nhello world\t1\n").unwrap();
        std::fs::write(
            dir.path().join("j.jsonl"),
            "{\"text\": \"one\"}\n{\"text\": \"two\"}\n",
        )
        .unwrap();

        let uploads = UploadDirectory::new(dir.path());
        let tsv = uploads.load(&id("t")).unwrap();
        assert_eq!(tsv.width(), 2);
        let jsonl = uploads.load(&id("j")).unwrap();
        assert_eq!(jsonl.height(), 2);
        assert_eq!(
            DatasetSchema::from_dataframe(&jsonl).kind_of("text"),
            Some(ColumnKind::Text)
        );
    }

    #[test]
    fn test_xlsx_first_sheet_is_read() {
        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let uploads = UploadDirectory::new(&fixtures);

        let schema = uploads.schema(&id("spreadsheet")).unwrap();
        assert_eq!(schema.kind_of("review"), Some(ColumnKind::Text));
        assert_eq!(schema.kind_of("rating"), Some(ColumnKind::Passthrough));

        let df = uploads.load(&id("spreadsheet")).unwrap();
        assert_eq!(df.height(), 3);
        let review = df.column("review").unwrap().as_materialized_series().str().unwrap();
        assert_eq!(review.get(0), Some("Great phone, love it"));
        assert_eq!(review.get(2), None);
        let rating = df.column("rating").unwrap().as_materialized_series();
        assert!(matches!(rating.dtype(), DataType::Int64 | DataType::Float64));
    }

    #[test]
    fn test_sheet_column_inference() {
        let mixed = [Data::String("a".to_string()), Data::Int(2), Data::Empty];
        let cells: Vec<&Data> = mixed.iter().collect();
        let series = sheet_column("m", &cells);
        assert_eq!(series.dtype(), &DataType::String);
        assert_eq!(series.str().unwrap().get(1), Some("2"));
        assert_eq!(series.null_count(), 1);

        let numbers = [Data::Int(1), Data::Float(2.5)];
        let cells: Vec<&Data> = numbers.iter().collect();
        assert_eq!(sheet_column("n", &cells).dtype(), &DataType::Float64);

        let flags = [Data::Bool(true), Data::Empty];
        let cells: Vec<&Data> = flags.iter().collect();
        assert_eq!(sheet_column("b", &cells).dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.docx"), b"PK").unwrap();

        let uploads = UploadDirectory::new(dir.path());
        let err = uploads.schema(&id("x")).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
        assert!(err.is_rejection());
    }

    #[test]
    fn test_corrupt_workbook_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.xlsx"), b"PK").unwrap();

        let uploads = UploadDirectory::new(dir.path());
        let err = uploads.load(&id("x")).unwrap_err();
        assert_eq!(err.error_code(), "SPREADSHEET_ERROR");
    }
}
