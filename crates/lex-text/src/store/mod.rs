//! In-memory column store.
//!
//! A [`ColumnStore`] holds named, typed columns of equal length. Source
//! columns come from a Polars `DataFrame`; derived columns are written batch
//! by batch through [`ColumnStore::write_range`], either growing a new column
//! or replacing a row range of an existing one in place.

mod schema;

pub use schema::{DatasetSchema, SchemaColumn};

use polars::prelude::{DataFrame, Series};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::ops::Range;

use crate::error::{ExecutionError, Result};
use crate::transforms::{Entity, PosTag};
use crate::types::{ColumnKind, TransformationKind};
use crate::utils::{any_value_to_json, f64_to_json, is_text_dtype};

/// Marker for a row a unit could not process. The job continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("row {row}: {reason}")]
pub struct RowError {
    pub row: usize,
    pub reason: String,
}

impl RowError {
    pub fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}

/// A derived cell: either a value or the error marker that replaced it.
pub type Cell<T> = std::result::Result<T, RowError>;

/// Where a derived column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLineage {
    pub source: String,
    pub step: usize,
    pub transformation: TransformationKind,
}

/// Cell storage of one column.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Tokens(Vec<Cell<Vec<String>>>),
    Tags(Vec<Cell<Vec<PosTag>>>),
    Vectors(Vec<Cell<Vec<f64>>>),
    Entities(Vec<Cell<Vec<Entity>>>),
    Passthrough(Series),
}

fn write_cells<T>(target: &mut Vec<T>, start: usize, chunk: Vec<T>) -> bool {
    let end = start + chunk.len();
    if start == target.len() {
        target.extend(chunk);
        true
    } else if end <= target.len() {
        for (slot, value) in target[start..end].iter_mut().zip(chunk) {
            *slot = value;
        }
        true
    } else {
        false
    }
}

fn cell_json<T: Serialize>(cell: &Cell<T>) -> Value {
    match cell {
        Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
        Err(e) => json!({ "error": e.reason }),
    }
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Text(_) => ColumnKind::Text,
            Self::Tokens(_) => ColumnKind::TokenSequence,
            Self::Tags(_) => ColumnKind::TagSequence,
            Self::Vectors(_) => ColumnKind::NumericVector,
            Self::Entities(_) => ColumnKind::EntityList,
            Self::Passthrough(_) => ColumnKind::Passthrough,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(cells) => cells.len(),
            Self::Tokens(cells) => cells.len(),
            Self::Tags(cells) => cells.len(),
            Self::Vectors(cells) => cells.len(),
            Self::Entities(cells) => cells.len(),
            Self::Passthrough(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `chunk` at `start`: append when `start` is the current length,
    /// otherwise overwrite the covered range. Returns false on a kind or
    /// range mismatch.
    fn write(&mut self, start: usize, chunk: ColumnData) -> bool {
        match (self, chunk) {
            (Self::Text(target), Self::Text(chunk)) => write_cells(target, start, chunk),
            (Self::Tokens(target), Self::Tokens(chunk)) => write_cells(target, start, chunk),
            (Self::Tags(target), Self::Tags(chunk)) => write_cells(target, start, chunk),
            (Self::Vectors(target), Self::Vectors(chunk)) => write_cells(target, start, chunk),
            (Self::Entities(target), Self::Entities(chunk)) => write_cells(target, start, chunk),
            _ => false,
        }
    }

    /// JSON form of one cell. Error markers become `{"error": reason}`.
    pub fn cell_json(&self, row: usize) -> Result<Value> {
        let value = match self {
            Self::Text(cells) => match cells.get(row) {
                Some(Some(text)) => Value::String(text.clone()),
                _ => Value::Null,
            },
            Self::Tokens(cells) => cells.get(row).map(cell_json).unwrap_or(Value::Null),
            Self::Tags(cells) => cells.get(row).map(cell_json).unwrap_or(Value::Null),
            Self::Vectors(cells) => match cells.get(row) {
                Some(Ok(vector)) => Value::Array(vector.iter().copied().map(f64_to_json).collect()),
                Some(cell) => cell_json(cell),
                None => Value::Null,
            },
            Self::Entities(cells) => cells.get(row).map(cell_json).unwrap_or(Value::Null),
            Self::Passthrough(series) => any_value_to_json(series.get(row)?),
        };
        Ok(value)
    }
}

/// One named column with optional lineage.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    pub lineage: Option<ColumnLineage>,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }
}

/// Ordered set of equal-length columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnStore {
    columns: Vec<Column>,
    rows: usize,
}

impl ColumnStore {
    /// Build a store from source columns. String columns become text, all
    /// other dtypes are carried through untouched.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut store = Self {
            columns: Vec::with_capacity(df.width()),
            rows: df.height(),
        };

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let data = if is_text_dtype(series.dtype()) {
                ColumnData::Text(
                    series
                        .str()?
                        .into_iter()
                        .map(|value| value.map(str::to_string))
                        .collect(),
                )
            } else {
                ColumnData::Passthrough(series.clone())
            };
            store.columns.push(Column {
                name: series.name().to_string(),
                data,
                lineage: None,
            });
        }

        Ok(store)
    }

    /// Build a store from text columns (tests and embedding).
    pub fn from_text_columns<N, I>(columns: I) -> std::result::Result<Self, ExecutionError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Option<String>>)>,
    {
        let mut store = Self::default();
        for (index, (name, cells)) in columns.into_iter().enumerate() {
            let name = name.into();
            if index == 0 {
                store.rows = cells.len();
            } else if cells.len() != store.rows {
                return Err(ExecutionError::RowCountMismatch {
                    column: name,
                    expected: store.rows,
                    found: cells.len(),
                });
            }
            store.columns.push(Column {
                name,
                data: ColumnData::Text(cells),
                lineage: None,
            });
        }
        Ok(store)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::new(
            self.columns
                .iter()
                .map(|column| (column.name.clone(), column.kind())),
        )
    }

    fn require(&self, name: &str, expected: ColumnKind) -> std::result::Result<&ColumnData, ExecutionError> {
        let column = self
            .column(name)
            .ok_or_else(|| ExecutionError::ColumnMissing(name.to_string()))?;
        if column.kind() != expected {
            return Err(ExecutionError::UnexpectedColumnKind {
                column: name.to_string(),
                expected,
                found: column.kind(),
            });
        }
        Ok(&column.data)
    }

    fn check_range(
        name: &str,
        len: usize,
        range: &Range<usize>,
    ) -> std::result::Result<(), ExecutionError> {
        if range.end > len {
            return Err(ExecutionError::RowCountMismatch {
                column: name.to_string(),
                expected: range.end,
                found: len,
            });
        }
        Ok(())
    }

    /// Borrow a row range of a text column.
    pub fn text_range(
        &self,
        name: &str,
        range: Range<usize>,
    ) -> std::result::Result<&[Option<String>], ExecutionError> {
        match self.require(name, ColumnKind::Text)? {
            ColumnData::Text(cells) => {
                Self::check_range(name, cells.len(), &range)?;
                Ok(&cells[range])
            }
            other => Err(ExecutionError::UnexpectedColumnKind {
                column: name.to_string(),
                expected: ColumnKind::Text,
                found: other.kind(),
            }),
        }
    }

    /// Borrow a row range of a token-sequence column.
    pub fn tokens_range(
        &self,
        name: &str,
        range: Range<usize>,
    ) -> std::result::Result<&[Cell<Vec<String>>], ExecutionError> {
        match self.require(name, ColumnKind::TokenSequence)? {
            ColumnData::Tokens(cells) => {
                Self::check_range(name, cells.len(), &range)?;
                Ok(&cells[range])
            }
            other => Err(ExecutionError::UnexpectedColumnKind {
                column: name.to_string(),
                expected: ColumnKind::TokenSequence,
                found: other.kind(),
            }),
        }
    }

    /// Write a batch of derived cells starting at row `start`.
    ///
    /// A missing column is created (only at row 0). An existing column must
    /// have the same kind; its lineage is replaced.
    pub fn write_range(
        &mut self,
        name: &str,
        start: usize,
        chunk: ColumnData,
        lineage: ColumnLineage,
    ) -> std::result::Result<(), ExecutionError> {
        let chunk_len = chunk.len();
        if start + chunk_len > self.rows {
            return Err(ExecutionError::RowCountMismatch {
                column: name.to_string(),
                expected: self.rows,
                found: start + chunk_len,
            });
        }

        match self.columns.iter_mut().find(|column| column.name == name) {
            Some(column) => {
                let (existing_kind, chunk_kind) = (column.kind(), chunk.kind());
                if existing_kind != chunk_kind {
                    return Err(ExecutionError::UnexpectedColumnKind {
                        column: name.to_string(),
                        expected: existing_kind,
                        found: chunk_kind,
                    });
                }
                let len = column.data.len();
                if !column.data.write(start, chunk) {
                    return Err(ExecutionError::RowCountMismatch {
                        column: name.to_string(),
                        expected: len,
                        found: start,
                    });
                }
                column.lineage = Some(lineage);
            }
            None => {
                if start != 0 {
                    return Err(ExecutionError::RowCountMismatch {
                        column: name.to_string(),
                        expected: 0,
                        found: start,
                    });
                }
                self.columns.push(Column {
                    name: name.to_string(),
                    data: chunk,
                    lineage: Some(lineage),
                });
            }
        }
        Ok(())
    }

    /// Check that every column has exactly `rows()` cells.
    pub fn check_complete(&self) -> std::result::Result<(), ExecutionError> {
        for column in &self.columns {
            if column.data.len() != self.rows {
                return Err(ExecutionError::RowCountMismatch {
                    column: column.name.clone(),
                    expected: self.rows,
                    found: column.data.len(),
                });
            }
        }
        Ok(())
    }

    /// Rename a column. Used to apply a pipeline's `output_column`.
    pub fn rename(&mut self, from: &str, to: &str) -> std::result::Result<(), ExecutionError> {
        let column = self
            .columns
            .iter_mut()
            .find(|column| column.name == from)
            .ok_or_else(|| ExecutionError::ColumnMissing(from.to_string()))?;
        column.name = to.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn lineage(step: usize) -> ColumnLineage {
        ColumnLineage {
            source: "text".to_string(),
            step,
            transformation: TransformationKind::Tokenization,
        }
    }

    fn tokens(words: &[&str]) -> Cell<Vec<String>> {
        Ok(words.iter().map(|w| w.to_string()).collect())
    }

    fn text_store() -> ColumnStore {
        ColumnStore::from_text_columns([(
            "text",
            vec![Some("a b".to_string()), None, Some("c".to_string())],
        )])
        .unwrap()
    }

    #[test]
    fn test_from_dataframe() {
        let df = df![
            "review" => [Some("good"), None],
            "stars" => [5i64, 1],
        ]
        .unwrap();

        let store = ColumnStore::from_dataframe(&df).unwrap();
        assert_eq!(store.rows(), 2);
        assert_eq!(store.column("review").unwrap().kind(), ColumnKind::Text);
        assert_eq!(store.column("stars").unwrap().kind(), ColumnKind::Passthrough);
        assert_eq!(
            store.text_range("review", 0..2).unwrap(),
            &[Some("good".to_string()), None]
        );
        assert_eq!(
            store.column("stars").unwrap().data.cell_json(1).unwrap(),
            serde_json::json!(1)
        );
    }

    #[test]
    fn test_write_range_grows_new_column() {
        let mut store = text_store();
        store
            .write_range("text_tokens", 0, ColumnData::Tokens(vec![tokens(&["a", "b"])]), lineage(0))
            .unwrap();
        store
            .write_range(
                "text_tokens",
                1,
                ColumnData::Tokens(vec![Err(RowError::new(1, "null text")), tokens(&["c"])]),
                lineage(0),
            )
            .unwrap();

        assert!(store.check_complete().is_ok());
        let cells = store.tokens_range("text_tokens", 0..3).unwrap();
        assert_eq!(cells[0], tokens(&["a", "b"]));
        assert_eq!(cells[1], Err(RowError::new(1, "null text")));
        assert_eq!(store.column("text_tokens").unwrap().lineage, Some(lineage(0)));
    }

    #[test]
    fn test_write_range_overwrites_in_place() {
        let mut store = text_store();
        let full = ColumnData::Tokens(vec![tokens(&["x"]), tokens(&["y"]), tokens(&["z"])]);
        store.write_range("t", 0, full, lineage(0)).unwrap();
        store
            .write_range("t", 1, ColumnData::Tokens(vec![tokens(&["new"])]), lineage(3))
            .unwrap();

        let cells = store.tokens_range("t", 0..3).unwrap();
        assert_eq!(cells[1], tokens(&["new"]));
        assert_eq!(cells[2], tokens(&["z"]));
        assert_eq!(store.column("t").unwrap().lineage.as_ref().map(|l| l.step), Some(3));
    }

    #[test]
    fn test_write_range_rejects_kind_change_and_gaps() {
        let mut store = text_store();
        let err = store
            .write_range("text", 0, ColumnData::Tokens(vec![tokens(&["a"])]), lineage(0))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnexpectedColumnKind { .. }));

        let err = store
            .write_range("fresh", 2, ColumnData::Tokens(vec![tokens(&["a"])]), lineage(0))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::RowCountMismatch { .. }));

        let err = store
            .write_range("fresh", 0, ColumnData::Tokens(vec![tokens(&["a"]); 4]), lineage(0))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::RowCountMismatch { .. }));
    }

    #[test]
    fn test_ranges_check_kind() {
        let store = text_store();
        assert!(matches!(
            store.tokens_range("text", 0..1),
            Err(ExecutionError::UnexpectedColumnKind { .. })
        ));
        assert!(matches!(
            store.text_range("nope", 0..1),
            Err(ExecutionError::ColumnMissing(_))
        ));
    }

    #[test]
    fn test_cell_json_error_marker() {
        let data = ColumnData::Vectors(vec![Ok(vec![0.5, 1.0]), Err(RowError::new(1, "null text"))]);
        assert_eq!(data.cell_json(0).unwrap(), serde_json::json!([0.5, 1.0]));
        assert_eq!(
            data.cell_json(1).unwrap(),
            serde_json::json!({"error": "null text"})
        );
    }

    #[test]
    fn test_mismatched_text_columns_rejected() {
        let result = ColumnStore::from_text_columns([
            ("a", vec![Some("x".to_string())]),
            ("b", vec![]),
        ]);
        assert!(matches!(result, Err(ExecutionError::RowCountMismatch { .. })));
    }
}
