use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::types::ColumnKind;
use crate::utils::is_text_dtype;

/// Name and kind of one dataset column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered column names and kinds of a dataset, as seen by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub columns: Vec<SchemaColumn>,
}

impl DatasetSchema {
    pub fn new(columns: impl IntoIterator<Item = (impl Into<String>, ColumnKind)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, kind)| SchemaColumn {
                    name: name.into(),
                    kind,
                })
                .collect(),
        }
    }

    /// String columns are text; every other dtype is passthrough.
    pub fn from_dataframe(df: &DataFrame) -> Self {
        Self::new(df.get_columns().iter().map(|column| {
            let kind = if is_text_dtype(column.dtype()) {
                ColumnKind::Text
            } else {
                ColumnKind::Passthrough
            };
            (column.name().to_string(), kind)
        }))
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_from_dataframe_kinds() {
        let df = df![
            "review" => ["good", "bad"],
            "stars" => [5i64, 1],
        ]
        .unwrap();

        let schema = DatasetSchema::from_dataframe(&df);
        assert_eq!(schema.kind_of("review"), Some(ColumnKind::Text));
        assert_eq!(schema.kind_of("stars"), Some(ColumnKind::Passthrough));
        assert_eq!(schema.kind_of("missing"), None);
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["review", "stars"]);
    }
}
