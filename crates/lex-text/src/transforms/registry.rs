//! Transformation registry.
//!
//! Maps a transformation type name to its [`UnitDescriptor`]: the column
//! kinds it reads and writes, how it names its output, and the ordered
//! parameter schema the validator checks against. Built once, read-only.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;

use crate::error::RegistryError;
use crate::transforms::entities::EntityType;
use crate::transforms::stopwords::{self, DEFAULT_LANGUAGE};
use crate::transforms::vectorize::{DEFAULT_MAX_FEATURES, VectorizeMethod};
use crate::types::{ColumnKind, TransformationKind};

/// Value shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Columns,
    Boolean,
    Language,
    Method,
    PositiveInteger,
    IntegerRange,
    EntityTypes,
}

/// One entry of a unit's parameter schema.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    #[serde(skip)]
    pub validator: fn(&Value) -> Result<(), String>,
}

impl ParamSpec {
    fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            validator: validator_for(kind),
        }
    }

    fn optional(name: &'static str, kind: ParamKind, default: Value) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            validator: validator_for(kind),
        }
    }

    /// Run the validator, returning the reason on failure.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.validator)(value)
    }
}

/// How a unit names the column it derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSuffix {
    Fixed(&'static str),
    /// `{col}_{method}` for vectorization.
    Method,
}

/// Static description of one transformation unit.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    pub kind: TransformationKind,
    pub input_kind: ColumnKind,
    pub output_kind: ColumnKind,
    pub suffix: OutputSuffix,
    /// Needs statistics over the whole column before transforming any row.
    pub column_wide: bool,
    pub params: Vec<ParamSpec>,
}

impl UnitDescriptor {
    /// Name of the column derived from `input`. `method` is only used by
    /// units whose suffix is the method name.
    pub fn derived_name(&self, input: &str, method: Option<VectorizeMethod>) -> String {
        match self.suffix {
            OutputSuffix::Fixed(suffix) => format!("{}_{}", input, suffix),
            OutputSuffix::Method => {
                let method = method.unwrap_or(VectorizeMethod::Tfidf);
                format!("{}_{}", input, method.as_str())
            }
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|spec| spec.name == name)
    }
}

// =============================================================================
// Parameter parsers
// =============================================================================

pub fn parse_columns(value: &Value) -> Result<Vec<String>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| "expected a list of column names".to_string())?;
    if items.is_empty() {
        return Err("expected at least one column".to_string());
    }

    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .as_str()
            .ok_or_else(|| format!("column names must be strings, got {}", item))?;
        if name.is_empty() {
            return Err("column names must not be empty".to_string());
        }
        if columns.iter().any(|existing: &String| existing == name) {
            return Err(format!("column '{}' is listed more than once", name));
        }
        columns.push(name.to_string());
    }
    Ok(columns)
}

pub fn parse_bool(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected a boolean, got {}", value))
}

pub fn parse_language(value: &Value) -> Result<&'static str, String> {
    let name = value
        .as_str()
        .ok_or_else(|| format!("expected a language name, got {}", value))?;
    stopwords::normalize_language(name).ok_or_else(|| {
        format!(
            "unsupported language '{}' (supported: {})",
            name,
            stopwords::SUPPORTED_LANGUAGES.join(", ")
        )
    })
}

pub fn parse_method(value: &Value) -> Result<VectorizeMethod, String> {
    let name = value
        .as_str()
        .ok_or_else(|| format!("expected 'tfidf' or 'count', got {}", value))?;
    VectorizeMethod::from_name(name)
        .ok_or_else(|| format!("unknown method '{}' (expected 'tfidf' or 'count')", name))
}

pub fn parse_positive_integer(value: &Value) -> Result<usize, String> {
    match value.as_u64() {
        Some(n) if n > 0 => usize::try_from(n).map_err(|_| format!("{} is too large", n)),
        _ => Err(format!("expected a positive integer, got {}", value)),
    }
}

pub fn parse_range(value: &Value) -> Result<(usize, usize), String> {
    let pair = value
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| format!("expected a pair [min, max], got {}", value))?;
    let min = parse_positive_integer(&pair[0])?;
    let max = parse_positive_integer(&pair[1])?;
    if min > max {
        return Err(format!("min {} is greater than max {}", min, max));
    }
    Ok((min, max))
}

pub fn parse_entity_types(value: &Value) -> Result<BTreeSet<EntityType>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| "expected a list of entity labels".to_string())?;
    if items.is_empty() {
        return Err("expected at least one entity label".to_string());
    }

    let mut labels = BTreeSet::new();
    for item in items {
        let label = item
            .as_str()
            .and_then(EntityType::from_name)
            .ok_or_else(|| {
                let supported: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
                format!(
                    "unsupported entity label {} (supported: {})",
                    item,
                    supported.join(", ")
                )
            })?;
        labels.insert(label);
    }
    Ok(labels)
}

fn validator_for(kind: ParamKind) -> fn(&Value) -> Result<(), String> {
    match kind {
        ParamKind::Columns => |v| parse_columns(v).map(drop),
        ParamKind::Boolean => |v| parse_bool(v).map(drop),
        ParamKind::Language => |v| parse_language(v).map(drop),
        ParamKind::Method => |v| parse_method(v).map(drop),
        ParamKind::PositiveInteger => |v| parse_positive_integer(v).map(drop),
        ParamKind::IntegerRange => |v| parse_range(v).map(drop),
        ParamKind::EntityTypes => |v| parse_entity_types(v).map(drop),
    }
}

// =============================================================================
// Registry
// =============================================================================

fn build(kind: TransformationKind) -> UnitDescriptor {
    let mut params = vec![ParamSpec::required("columns", ParamKind::Columns)];
    let (input_kind, output_kind, suffix, column_wide) = match kind {
        TransformationKind::Tokenization => {
            params.push(ParamSpec::optional("lowercase", ParamKind::Boolean, json!(false)));
            (ColumnKind::Text, ColumnKind::TokenSequence, OutputSuffix::Fixed("tokens"), false)
        }
        TransformationKind::StopwordRemoval => {
            params.push(ParamSpec::optional(
                "language",
                ParamKind::Language,
                json!(DEFAULT_LANGUAGE),
            ));
            (
                ColumnKind::TokenSequence,
                ColumnKind::TokenSequence,
                OutputSuffix::Fixed("filtered"),
                false,
            )
        }
        TransformationKind::Lemmatization => (
            ColumnKind::TokenSequence,
            ColumnKind::TokenSequence,
            OutputSuffix::Fixed("lemmatized"),
            false,
        ),
        TransformationKind::Stemming => (
            ColumnKind::TokenSequence,
            ColumnKind::TokenSequence,
            OutputSuffix::Fixed("stemmed"),
            false,
        ),
        TransformationKind::PosTagging => (
            ColumnKind::TokenSequence,
            ColumnKind::TagSequence,
            OutputSuffix::Fixed("pos"),
            false,
        ),
        TransformationKind::TextVectorization => {
            params.push(ParamSpec::required("method", ParamKind::Method));
            params.push(ParamSpec::optional(
                "max_features",
                ParamKind::PositiveInteger,
                json!(DEFAULT_MAX_FEATURES),
            ));
            params.push(ParamSpec::optional("ngram_range", ParamKind::IntegerRange, json!([1, 1])));
            params.push(ParamSpec::optional("lowercase", ParamKind::Boolean, json!(true)));
            (
                ColumnKind::TokenSequence,
                ColumnKind::NumericVector,
                OutputSuffix::Method,
                true,
            )
        }
        TransformationKind::NamedEntityRecognition => {
            let defaults: Vec<&str> = EntityType::DEFAULTS.iter().map(|t| t.as_str()).collect();
            params.push(ParamSpec::optional(
                "entity_types",
                ParamKind::EntityTypes,
                json!(defaults),
            ));
            (ColumnKind::Text, ColumnKind::EntityList, OutputSuffix::Fixed("entities"), false)
        }
    };
    params.push(ParamSpec::optional("overwrite", ParamKind::Boolean, json!(false)));

    UnitDescriptor {
        kind,
        input_kind,
        output_kind,
        suffix,
        column_wide,
        params,
    }
}

static REGISTRY: Lazy<[UnitDescriptor; 7]> = Lazy::new(|| TransformationKind::ALL.map(build));

/// Descriptor of a known transformation kind.
pub fn descriptor(kind: TransformationKind) -> &'static UnitDescriptor {
    &REGISTRY[kind as usize]
}

/// Resolve a wire type name.
pub fn lookup(name: &str) -> Result<&'static UnitDescriptor, RegistryError> {
    TransformationKind::from_name(name)
        .map(descriptor)
        .ok_or_else(|| RegistryError::UnknownTransformationType(name.to_string()))
}

/// Ordered parameter schema of a wire type name.
pub fn param_schema(name: &str) -> Result<&'static [ParamSpec], RegistryError> {
    lookup(name).map(|unit| unit.params.as_slice())
}
