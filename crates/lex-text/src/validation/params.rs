use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ValidationError, ValidationErrors};
use crate::pipeline::StepOp;
use crate::transforms::registry::{
    UnitDescriptor, parse_bool, parse_columns, parse_entity_types, parse_language, parse_method,
    parse_positive_integer, parse_range,
};
use crate::transforms::VectorizeParams;
use crate::types::TransformationKind;

/// Parameters of one step after checking against the unit's schema.
pub(super) struct ResolvedParams {
    /// None when any parameter the op needs was missing or malformed.
    pub op: Option<StepOp>,
    pub columns: Option<Vec<String>>,
    pub overwrite: bool,
}

struct StepParams<'a> {
    step: usize,
    unit: &'a UnitDescriptor,
    values: &'a Map<String, Value>,
    errors: &'a mut ValidationErrors,
}

impl StepParams<'_> {
    /// Look up `name`, falling back to the schema default. The schema
    /// validator gates the value; `parse` is only run on accepted values.
    fn take<T>(&mut self, name: &str, parse: fn(&Value) -> Result<T, String>) -> Option<T> {
        let spec = self.unit.param(name)?;
        let value = match self.values.get(name).or(spec.default.as_ref()) {
            Some(value) => value,
            None => {
                self.errors.push(ValidationError::MissingParameter {
                    step: self.step,
                    name: name.to_string(),
                });
                return None;
            }
        };

        if let Err(reason) = spec.check(value) {
            self.errors.push(ValidationError::MalformedParameter {
                step: self.step,
                name: name.to_string(),
                reason,
            });
            return None;
        }
        parse(value).ok()
    }
}

pub(super) fn resolve(
    step: usize,
    unit: &UnitDescriptor,
    values: &Map<String, Value>,
    errors: &mut ValidationErrors,
) -> ResolvedParams {
    for name in values.keys() {
        if unit.param(name).is_none() {
            warn!(
                "Step {}: ignoring unknown parameter '{}' for {}",
                step, name, unit.kind
            );
        }
    }

    let mut params = StepParams {
        step,
        unit,
        values,
        errors,
    };
    let columns = params.take("columns", parse_columns);
    let overwrite = params.take("overwrite", parse_bool).unwrap_or(false);

    let op = match unit.kind {
        TransformationKind::Tokenization => params
            .take("lowercase", parse_bool)
            .map(|lowercase| StepOp::Tokenize { lowercase }),
        TransformationKind::StopwordRemoval => params
            .take("language", parse_language)
            .map(|language| StepOp::RemoveStopwords { language }),
        TransformationKind::Lemmatization => Some(StepOp::Lemmatize),
        TransformationKind::Stemming => Some(StepOp::Stem),
        TransformationKind::PosTagging => Some(StepOp::TagPartsOfSpeech),
        TransformationKind::TextVectorization => {
            let method = params.take("method", parse_method);
            let max_features = params.take("max_features", parse_positive_integer);
            let ngram_range = params.take("ngram_range", parse_range);
            let lowercase = params.take("lowercase", parse_bool);
            match (method, max_features, ngram_range, lowercase) {
                (Some(method), Some(max_features), Some(ngram_range), Some(lowercase)) => {
                    Some(StepOp::Vectorize(VectorizeParams {
                        method,
                        max_features,
                        ngram_range,
                        lowercase,
                    }))
                }
                _ => None,
            }
        }
        TransformationKind::NamedEntityRecognition => params
            .take("entity_types", parse_entity_types)
            .map(|entity_types| StepOp::ExtractEntities { entity_types }),
    };

    ResolvedParams {
        op,
        columns,
        overwrite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::registry::lookup;
    use crate::transforms::{EntityType, VectorizeMethod};
    use serde_json::json;

    fn run(kind: &str, params: Value) -> (ResolvedParams, ValidationErrors) {
        let unit = lookup(kind).unwrap();
        let mut errors = ValidationErrors::new(Vec::new());
        let map = params.as_object().cloned().unwrap_or_default();
        let resolved = resolve(0, unit, &map, &mut errors);
        (resolved, errors)
    }

    #[test]
    fn test_defaults_applied() {
        let (resolved, errors) = run("text_vectorization", json!({"columns": ["t"], "method": "count"}));
        assert!(errors.is_empty());
        assert!(!resolved.overwrite);
        assert_eq!(
            resolved.op,
            Some(StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Count)))
        );

        let (resolved, _) = run("named_entity_recognition", json!({"columns": ["t"]}));
        let Some(StepOp::ExtractEntities { entity_types }) = resolved.op else {
            panic!("expected entity op");
        };
        assert_eq!(entity_types.into_iter().collect::<Vec<_>>(), EntityType::DEFAULTS.to_vec());
    }

    #[test]
    fn test_missing_and_malformed_collected() {
        let (resolved, errors) = run(
            "text_vectorization",
            json!({"max_features": 0, "ngram_range": [3, 1], "overwrite": "yes"}),
        );
        assert!(resolved.op.is_none());
        assert!(resolved.columns.is_none());

        let codes: Vec<(&str, Option<usize>)> =
            errors.iter().map(|e| (e.code(), e.step())).collect();
        assert_eq!(
            codes,
            vec![
                ("MISSING_PARAMETER", Some(0)),
                ("MALFORMED_PARAMETER", Some(0)),
                ("MISSING_PARAMETER", Some(0)),
                ("MALFORMED_PARAMETER", Some(0)),
                ("MALFORMED_PARAMETER", Some(0)),
            ]
        );
    }

    #[test]
    fn test_unknown_params_ignored() {
        let (resolved, errors) = run("stemming", json!({"columns": ["t"], "aggressive": true}));
        assert!(errors.is_empty());
        assert_eq!(resolved.op, Some(StepOp::Stem));
    }

    #[test]
    fn test_language_normalised() {
        let (resolved, errors) = run("stopword_removal", json!({"columns": ["t"], "language": "German"}));
        assert!(errors.is_empty());
        assert_eq!(resolved.op, Some(StepOp::RemoveStopwords { language: "german" }));
    }
}
