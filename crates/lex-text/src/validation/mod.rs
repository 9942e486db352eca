//! Pipeline validation.
//!
//! [`validate`] checks a submitted [`PipelineConfig`] against the
//! transformation registry and the dataset schema and either returns a
//! [`ValidatedPipeline`] or every problem it found. Columns are resolved
//! against a known-columns accumulator seeded with the dataset's columns
//! and grown by each step's outputs, so a step may only read columns that
//! exist by the time it runs.

mod params;

use std::collections::HashMap;
use tracing::debug;

use crate::error::{ValidationError, ValidationErrors};
use crate::pipeline::{ColumnBinding, PlannedStep, StepOp, ValidatedPipeline};
use crate::store::DatasetSchema;
use crate::transforms::registry;
use crate::types::{ColumnKind, PipelineConfig};

/// Validate `config` against `schema`. `default_batch_size` applies when
/// the config sets none.
pub fn validate(
    schema: &DatasetSchema,
    config: &PipelineConfig,
    default_batch_size: usize,
) -> Result<ValidatedPipeline, ValidationErrors> {
    let mut errors = ValidationErrors::new(Vec::new());

    if config.transformations.is_empty() {
        errors.push(ValidationError::EmptyPipeline);
    }

    match schema.kind_of(&config.input_column) {
        None => errors.push(ValidationError::UnknownInputColumn(config.input_column.clone())),
        Some(ColumnKind::Text) => {}
        Some(kind) => errors.push(ValidationError::InputColumnNotText {
            column: config.input_column.clone(),
            kind,
        }),
    }

    let batch_size = match config.batch_size {
        Some(size) if size < 1 => {
            errors.push(ValidationError::InvalidBatchSize(size));
            default_batch_size
        }
        Some(size) => usize::try_from(size).unwrap_or(usize::MAX),
        None => default_batch_size,
    };

    let mut known: HashMap<String, ColumnKind> = schema
        .columns
        .iter()
        .map(|column| (column.name.clone(), column.kind))
        .collect();
    let mut steps = Vec::with_capacity(config.transformations.len());
    let mut last_outputs: Option<Vec<String>> = None;

    for (index, step) in config.transformations.iter().enumerate() {
        let unit = match registry::lookup(&step.kind) {
            Ok(unit) => unit,
            Err(_) => {
                errors.push(ValidationError::UnknownTransformationType {
                    step: index,
                    name: step.kind.clone(),
                });
                last_outputs = None;
                continue;
            }
        };

        let resolved = params::resolve(index, unit, &step.params, &mut errors);
        let Some(columns) = resolved.columns else {
            last_outputs = None;
            continue;
        };
        let method = match &resolved.op {
            Some(StepOp::Vectorize(params)) => Some(params.method),
            _ => None,
        };

        let mut bindings = Vec::with_capacity(columns.len());
        for column in columns {
            match known.get(&column) {
                None => errors.push(ValidationError::UnknownColumn {
                    step: index,
                    column: column.clone(),
                }),
                Some(&kind) if kind != unit.input_kind => {
                    errors.push(ValidationError::ColumnKindMismatch {
                        step: index,
                        column: column.clone(),
                        expected: unit.input_kind,
                        found: kind,
                    })
                }
                Some(_) => {}
            }

            let output = unit.derived_name(&column, method);
            let existing = known.get(&output).copied();
            if let Some(existing) = existing {
                if !resolved.overwrite {
                    errors.push(ValidationError::ColumnCollision {
                        step: index,
                        column: output.clone(),
                    });
                } else if existing != unit.output_kind {
                    errors.push(ValidationError::OverwriteKindConflict {
                        step: index,
                        column: output.clone(),
                        existing,
                        produced: unit.output_kind,
                    });
                }
            }

            // Outputs of failed steps are still recorded so one mistake
            // does not cascade into UnknownColumn errors downstream.
            known.insert(output.clone(), unit.output_kind);
            bindings.push(ColumnBinding {
                input: column,
                output,
                overwrite: existing.is_some(),
            });
        }

        last_outputs = Some(bindings.iter().map(|b| b.output.clone()).collect());
        if let Some(op) = resolved.op {
            debug!(
                "Step {}: {} over {} column(s)",
                index,
                unit.kind,
                bindings.len()
            );
            steps.push(PlannedStep {
                index,
                op,
                bindings,
            });
        }
    }

    if let Some(name) = &config.output_column
        && let Some(outputs) = &last_outputs
    {
        if outputs.len() > 1 {
            errors.push(ValidationError::OutputColumnAmbiguous {
                column: name.clone(),
                outputs: outputs.len(),
            });
        } else if !outputs.contains(name) && known.contains_key(name) {
            errors.push(ValidationError::OutputColumnCollision(name.clone()));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedPipeline {
        input_column: config.input_column.clone(),
        output_column: config
            .output_column
            .clone()
            .filter(|name| last_outputs.as_ref().is_none_or(|outputs| !outputs.contains(name))),
        batch_size,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::{VectorizeMethod, VectorizeParams};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> DatasetSchema {
        DatasetSchema::new([
            ("review", ColumnKind::Text),
            ("title", ColumnKind::Text),
            ("stars", ColumnKind::Passthrough),
        ])
    }

    fn codes(errors: &ValidationErrors) -> Vec<&'static str> {
        errors.iter().map(|e| e.code()).collect()
    }

    #[test]
    fn test_valid_chain() {
        let config = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"], "lowercase": true}))
            .step("stopword_removal", json!({"columns": ["review_tokens"]}))
            .step("stemming", json!({"columns": ["review_tokens_filtered"]}))
            .step(
                "text_vectorization",
                json!({"columns": ["review_tokens_filtered_stemmed"], "method": "tfidf", "max_features": 50}),
            );

        let plan = validate(&schema(), &config, 1000).unwrap();
        assert_eq!(plan.batch_size, 1000);
        assert_eq!(plan.steps.len(), 4);
        assert_eq!(plan.steps[0].op, StepOp::Tokenize { lowercase: true });
        assert_eq!(
            plan.steps[3].bindings[0].output,
            "review_tokens_filtered_stemmed_tfidf"
        );
        let mut params = VectorizeParams::new(VectorizeMethod::Tfidf);
        params.max_features = 50;
        assert_eq!(plan.steps[3].op, StepOp::Vectorize(params));
    }

    #[test]
    fn test_step_reads_column_before_it_exists() {
        let config = PipelineConfig::new("review")
            .step("stopword_removal", json!({"columns": ["review_tokens"]}))
            .step("tokenization", json!({"columns": ["review"]}));

        let errors = validate(&schema(), &config, 1000).unwrap_err();
        assert_eq!(
            errors.as_slice(),
            &[ValidationError::UnknownColumn {
                step: 0,
                column: "review_tokens".to_string()
            }]
        );
    }

    #[test]
    fn test_every_error_collected() {
        let config = PipelineConfig::new("stars")
            .step("sentiment", json!({"columns": ["review"]}))
            .step("lemmatization", json!({"columns": ["review"]}))
            .step("text_vectorization", json!({"columns": ["missing"], "method": "bm25"}))
            .batch_size(0);

        let errors = validate(&schema(), &config, 1000).unwrap_err();
        assert_eq!(
            codes(&errors),
            vec![
                "INPUT_COLUMN_NOT_TEXT",
                "INVALID_BATCH_SIZE",
                "UNKNOWN_TRANSFORMATION_TYPE",
                "COLUMN_KIND_MISMATCH",
                "MALFORMED_PARAMETER",
                "UNKNOWN_COLUMN",
            ]
        );
        assert_eq!(errors.as_slice()[2].step(), Some(0));
        assert_eq!(errors.as_slice()[5].column(), Some("missing"));
    }

    #[test]
    fn test_empty_and_unknown_input() {
        let config = PipelineConfig::new("body");
        let errors = validate(&schema(), &config, 1000).unwrap_err();
        assert_eq!(codes(&errors), vec!["EMPTY_PIPELINE", "UNKNOWN_INPUT_COLUMN"]);
    }

    #[test]
    fn test_collision_requires_overwrite() {
        let schema = DatasetSchema::new([
            ("review", ColumnKind::Text),
            ("review_tokens", ColumnKind::TokenSequence),
        ]);
        let collide = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}));
        let errors = validate(&schema, &collide, 1000).unwrap_err();
        assert_eq!(codes(&errors), vec!["COLUMN_COLLISION"]);

        let overwrite = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"], "overwrite": true}));
        let plan = validate(&schema, &overwrite, 1000).unwrap();
        assert!(plan.steps[0].bindings[0].overwrite);
    }

    #[test]
    fn test_overwrite_kind_conflict() {
        let schema = DatasetSchema::new([
            ("review", ColumnKind::Text),
            ("review_tokens", ColumnKind::Passthrough),
        ]);
        let config = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"], "overwrite": true}));
        let errors = validate(&schema, &config, 1000).unwrap_err();
        assert_eq!(codes(&errors), vec!["OVERWRITE_KIND_CONFLICT"]);
    }

    #[test]
    fn test_repeated_step_collides_with_earlier_output() {
        let config = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}))
            .step("tokenization", json!({"columns": ["review"]}));
        let errors = validate(&schema(), &config, 1000).unwrap_err();
        assert_eq!(
            errors.as_slice(),
            &[ValidationError::ColumnCollision {
                step: 1,
                column: "review_tokens".to_string()
            }]
        );
    }

    #[test]
    fn test_output_column_rules() {
        let single = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}))
            .output_column("words");
        let plan = validate(&schema(), &single, 1000).unwrap();
        assert_eq!(plan.output_column.as_deref(), Some("words"));

        let same_name = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}))
            .output_column("review_tokens");
        assert_eq!(validate(&schema(), &same_name, 1000).unwrap().output_column, None);

        let ambiguous = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review", "title"]}))
            .output_column("words");
        let errors = validate(&schema(), &ambiguous, 1000).unwrap_err();
        assert_eq!(codes(&errors), vec!["OUTPUT_COLUMN_AMBIGUOUS"]);

        let collision = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}))
            .output_column("title");
        let errors = validate(&schema(), &collision, 1000).unwrap_err();
        assert_eq!(codes(&errors), vec!["OUTPUT_COLUMN_COLLISION"]);
    }

    #[test]
    fn test_explicit_batch_size() {
        let config = PipelineConfig::new("review")
            .step("tokenization", json!({"columns": ["review"]}))
            .batch_size(64);
        assert_eq!(validate(&schema(), &config, 1000).unwrap().batch_size, 64);
    }
}
