//! Transformation units.
//!
//! Each submodule implements one unit as plain functions over tokens or
//! text. [`apply`] dispatches a planned [`StepOp`] over one batch of the
//! column store, turning null text and upstream error markers into
//! row-level [`RowError`]s.

pub mod entities;
pub mod lemmatize;
pub mod pos;
pub mod registry;
pub mod stem;
pub mod stopwords;
pub mod tokenize;
pub mod vectorize;

pub use entities::{Entity, EntityType};
pub use pos::PosTag;
pub use registry::{ParamKind, ParamSpec, UnitDescriptor};
pub use vectorize::{FittedVectorizer, VectorizeMethod, VectorizeParams, Vectorizer};

use std::ops::Range;

use crate::error::ExecutionError;
use crate::pipeline::StepOp;
use crate::store::{Cell, ColumnData, ColumnStore, RowError};

const NULL_TEXT: &str = "null text";

fn map_text<T>(cells: &[Option<String>], start: usize, f: impl Fn(&str) -> T) -> Vec<Cell<T>> {
    cells
        .iter()
        .enumerate()
        .map(|(offset, cell)| match cell {
            Some(text) => Ok(f(text)),
            None => Err(RowError::new(start + offset, NULL_TEXT)),
        })
        .collect()
}

fn map_tokens<T>(cells: &[Cell<Vec<String>>], f: impl Fn(&[String]) -> T) -> Vec<Cell<T>> {
    cells
        .iter()
        .map(|cell| match cell {
            Ok(tokens) => Ok(f(tokens)),
            Err(e) => Err(e.clone()),
        })
        .collect()
}

/// Apply one step to rows `range` of column `input`.
///
/// Vectorization needs the model fitted over the whole column; every other
/// op ignores `fitted`.
pub fn apply(
    op: &StepOp,
    store: &ColumnStore,
    input: &str,
    range: Range<usize>,
    fitted: Option<&FittedVectorizer>,
) -> Result<ColumnData, ExecutionError> {
    let start = range.start;
    let data = match op {
        StepOp::Tokenize { lowercase } => {
            let cells = store.text_range(input, range)?;
            ColumnData::Tokens(map_text(cells, start, |text| {
                tokenize::tokenize(text, *lowercase)
            }))
        }
        StepOp::ExtractEntities { entity_types } => {
            let cells = store.text_range(input, range)?;
            ColumnData::Entities(map_text(cells, start, |text| {
                entities::extract(text, entity_types)
            }))
        }
        StepOp::RemoveStopwords { language } => {
            let cells = store.tokens_range(input, range)?;
            ColumnData::Tokens(map_tokens(cells, |tokens| {
                stopwords::remove_stopwords(language, tokens)
            }))
        }
        StepOp::Lemmatize => {
            let cells = store.tokens_range(input, range)?;
            ColumnData::Tokens(map_tokens(cells, lemmatize::lemmatize))
        }
        StepOp::Stem => {
            let cells = store.tokens_range(input, range)?;
            ColumnData::Tokens(map_tokens(cells, stem::stem_all))
        }
        StepOp::TagPartsOfSpeech => {
            let cells = store.tokens_range(input, range)?;
            ColumnData::Tags(map_tokens(cells, pos::tag))
        }
        StepOp::Vectorize(_) => {
            let cells = store.tokens_range(input, range)?;
            let model = fitted.ok_or_else(|| ExecutionError::NotFitted(input.to_string()))?;
            ColumnData::Vectors(model.transform(cells))
        }
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn store() -> ColumnStore {
        ColumnStore::from_text_columns([(
            "text",
            vec![
                Some("hello world".to_string()),
                Some(String::new()),
                None,
            ],
        )])
        .unwrap()
    }

    #[test]
    fn test_tokenize_preserves_length_and_order() {
        let store = store();
        let data = apply(&StepOp::Tokenize { lowercase: false }, &store, "text", 0..2, None).unwrap();

        let ColumnData::Tokens(cells) = data else {
            panic!("expected tokens");
        };
        assert_eq!(
            cells,
            vec![Ok(vec!["hello".to_string(), "world".to_string()]), Ok(vec![])]
        );
    }

    #[test]
    fn test_null_text_becomes_row_error_with_absolute_row() {
        let store = store();
        let data = apply(&StepOp::Tokenize { lowercase: false }, &store, "text", 2..3, None).unwrap();

        let ColumnData::Tokens(cells) = data else {
            panic!("expected tokens");
        };
        assert_eq!(cells, vec![Err(RowError::new(2, NULL_TEXT))]);
    }

    #[test]
    fn test_error_markers_carried_forward() {
        let mut store = store();
        let tokens = apply(&StepOp::Tokenize { lowercase: true }, &store, "text", 0..3, None).unwrap();
        store
            .write_range(
                "text_tokens",
                0,
                tokens,
                crate::store::ColumnLineage {
                    source: "text".to_string(),
                    step: 0,
                    transformation: crate::types::TransformationKind::Tokenization,
                },
            )
            .unwrap();

        let tagged = apply(&StepOp::TagPartsOfSpeech, &store, "text_tokens", 0..3, None).unwrap();
        let ColumnData::Tags(cells) = tagged else {
            panic!("expected tags");
        };
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].as_ref().map(Vec::len), Ok(2));
        assert_eq!(cells[2], Err(RowError::new(2, NULL_TEXT)));
    }

    #[test]
    fn test_entities_over_text() {
        let store = ColumnStore::from_text_columns([(
            "text",
            vec![Some("Barack Obama visited Paris.".to_string())],
        )])
        .unwrap();
        let op = StepOp::ExtractEntities {
            entity_types: BTreeSet::from([EntityType::Gpe]),
        };

        let ColumnData::Entities(cells) = apply(&op, &store, "text", 0..1, None).unwrap() else {
            panic!("expected entities");
        };
        let found = cells[0].as_ref().unwrap();
        assert!(found.iter().all(|e| e.label == EntityType::Gpe));
        assert!(found.iter().any(|e| e.text == "Paris"));
    }

    #[test]
    fn test_vectorize_requires_fitted_model() {
        let mut store = store();
        let tokens = apply(&StepOp::Tokenize { lowercase: true }, &store, "text", 0..3, None).unwrap();
        store
            .write_range(
                "text_tokens",
                0,
                tokens,
                crate::store::ColumnLineage {
                    source: "text".to_string(),
                    step: 0,
                    transformation: crate::types::TransformationKind::Tokenization,
                },
            )
            .unwrap();
        let op = StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Count));

        assert!(matches!(
            apply(&op, &store, "text_tokens", 0..2, None),
            Err(ExecutionError::NotFitted(column)) if column == "text_tokens"
        ));
    }

    #[test]
    fn test_vectorize_rejects_text_column() {
        let store = store();
        let op = StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Count));
        assert!(matches!(
            apply(&op, &store, "text", 0..1, None),
            Err(ExecutionError::UnexpectedColumnKind { .. })
        ));
    }
}
