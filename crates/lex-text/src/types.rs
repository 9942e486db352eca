use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Identifier of an uploaded dataset, and of the job processing it.
///
/// File ids end up in file names (`processed_{id}.csv`, `processing_{id}.json`),
/// so they are restricted to a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Parse and validate a file id.
    pub fn parse(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let reason = if id.trim().is_empty() {
            Some("must not be empty")
        } else if id.starts_with('.') {
            Some("must not start with '.'")
        } else if id.contains(['/', '\\']) {
            Some("must not contain path separators")
        } else if id.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PipelineError::InvalidFileId {
                id,
                reason: reason.to_string(),
            }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FileId {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for FileId {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

/// Semantic kind of a column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    TokenSequence,
    NumericVector,
    EntityList,
    TagSequence,
    /// Non-text source column carried through untouched.
    Passthrough,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TokenSequence => "token_sequence",
            Self::NumericVector => "numeric_vector",
            Self::EntityList => "entity_list",
            Self::TagSequence => "tag_sequence",
            Self::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of transformation types a pipeline step may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    Tokenization,
    StopwordRemoval,
    Lemmatization,
    Stemming,
    PosTagging,
    TextVectorization,
    NamedEntityRecognition,
}

impl TransformationKind {
    pub const ALL: [TransformationKind; 7] = [
        Self::Tokenization,
        Self::StopwordRemoval,
        Self::Lemmatization,
        Self::Stemming,
        Self::PosTagging,
        Self::TextVectorization,
        Self::NamedEntityRecognition,
    ];

    /// Wire name used in pipeline configs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokenization => "tokenization",
            Self::StopwordRemoval => "stopword_removal",
            Self::Lemmatization => "lemmatization",
            Self::Stemming => "stemming",
            Self::PosTagging => "pos_tagging",
            Self::TextVectorization => "text_vectorization",
            Self::NamedEntityRecognition => "named_entity_recognition",
        }
    }

    /// Resolve a wire name. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Returns a human-readable name for progress messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Tokenization => "Tokenizing",
            Self::StopwordRemoval => "Removing Stopwords",
            Self::Lemmatization => "Lemmatizing",
            Self::Stemming => "Stemming",
            Self::PosTagging => "Tagging Parts of Speech",
            Self::TextVectorization => "Vectorizing",
            Self::NamedEntityRecognition => "Extracting Entities",
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a submitted pipeline, as it arrives over the wire.
///
/// `kind` stays a raw string here so that unknown types are reported by the
/// validator together with every other problem instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationStep {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl TransformationStep {
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// A submitted pipeline configuration.
///
/// ```json
/// {
///   "transformations": [
///     {"type": "tokenization", "params": {"columns": ["review"]}},
///     {"type": "stopword_removal", "params": {"columns": ["review_tokens"]}}
///   ],
///   "input_column": "review",
///   "batch_size": 500
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub transformations: Vec<TransformationStep>,
    pub input_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_column: Option<String>,
    /// Signed so that zero and negative values reach the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,
}

impl PipelineConfig {
    pub fn new(input_column: impl Into<String>) -> Self {
        Self {
            transformations: Vec::new(),
            input_column: input_column.into(),
            output_column: None,
            batch_size: None,
        }
    }

    /// Append a step.
    pub fn step(mut self, kind: impl Into<String>, params: serde_json::Value) -> Self {
        self.transformations.push(TransformationStep::new(kind, params));
        self
    }

    pub fn output_column(mut self, column: impl Into<String>) -> Self {
        self.output_column = Some(column.into());
        self
    }

    pub fn batch_size(mut self, rows: i64) -> Self {
        self.batch_size = Some(rows);
        self
    }
}
