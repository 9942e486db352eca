//! Error types for the text pipeline engine.
//!
//! This module provides the error hierarchy using `thiserror`:
//!
//! - [`PipelineError`]: top-level error returned by the public API
//! - [`ValidationError`]: one itemised problem found in a pipeline config
//! - [`ExecutionError`]: fatal failure while a job is running
//! - [`RegistryError`]: lookup failure in the transformation registry
//!
//! Errors are serializable as `{code, message}` so they can be stored in
//! job status records and handed to API clients unchanged.

use serde::Serialize;
use serde::ser::{SerializeSeq, SerializeStruct};
use thiserror::Error;

use crate::config::ConfigValidationError;
use crate::jobs::JobState;
use crate::types::ColumnKind;

/// The main error type for the pipeline engine.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The submitted pipeline failed validation; no job was created.
    #[error("Invalid pipeline configuration: {0}")]
    Config(ValidationErrors),

    /// A job for the file id is already queued or running.
    #[error("A job for '{file_id}' is already {state}")]
    Concurrency { file_id: String, state: JobState },

    /// No dataset exists for the file id.
    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    /// The dataset exists but its format cannot be read.
    #[error("Unsupported dataset format '.{extension}' for '{file_id}'")]
    UnsupportedFormat { file_id: String, extension: String },

    /// The file id is not a valid single path component.
    #[error("Invalid file id '{id}': {reason}")]
    InvalidFileId { id: String, reason: String },

    /// No job has been recorded for the file id.
    #[error("No job found for '{0}'")]
    JobNotFound(String),

    /// The job exists but has no result yet (or ended in error).
    #[error("Result for '{file_id}' is not available: job is {state}")]
    NotReady { file_id: String, state: JobState },

    /// A state transition the job lifecycle does not allow.
    #[error("Invalid transition for job '{file_id}': {from} -> {to}")]
    InvalidTransition {
        file_id: String,
        from: JobState,
        to: JobState,
    },

    /// A worker addressed a job that has since been replaced by a newer
    /// submission for the same file id.
    #[error("Job generation {generation} for '{file_id}' has been superseded")]
    Superseded { file_id: String, generation: u64 },

    /// Fatal error raised while running a pipeline.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Transformation registry lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    EngineConfig(#[from] ConfigValidationError),

    /// Internal error (e.g., worker spawn failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet workbook could not be opened or read.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Concurrency { .. } => "CONCURRENCY_ERROR",
            Self::DatasetNotFound(_) => "DATASET_NOT_FOUND",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::InvalidFileId { .. } => "INVALID_FILE_ID",
            Self::JobNotFound(_) => "NOT_FOUND",
            Self::NotReady { .. } => "NOT_READY",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Superseded { .. } => "SUPERSEDED",
            Self::Execution(e) => e.error_code(),
            Self::Registry(e) => e.error_code(),
            Self::EngineConfig(_) => "ENGINE_CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Itemised validation errors, if this is a config rejection.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            Self::Config(errors) => Some(errors.as_slice()),
            Self::WithContext { source, .. } => source.validation_errors(),
            _ => None,
        }
    }

    /// Check if this error was raised synchronously at submission time,
    /// before any job state was touched.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Concurrency { .. }
            | Self::DatasetNotFound(_)
            | Self::UnsupportedFormat { .. }
            | Self::InvalidFileId { .. } => true,
            Self::WithContext { source, .. } => source.is_rejection(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let errors = self.validation_errors();
        let mut state =
            serializer.serialize_struct("PipelineError", if errors.is_some() { 3 } else { 2 })?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(errors) = errors {
            state.serialize_field("errors", errors)?;
        }
        state.end()
    }
}

/// One problem found while validating a pipeline config.
///
/// `step` is the zero-based position of the offending step in
/// `transformations`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Pipeline has no transformation steps")]
    EmptyPipeline,

    #[error("Step {step}: unknown transformation type '{name}'")]
    UnknownTransformationType { step: usize, name: String },

    #[error("Step {step}: missing required parameter '{name}'")]
    MissingParameter { step: usize, name: String },

    #[error("Step {step}: malformed parameter '{name}': {reason}")]
    MalformedParameter {
        step: usize,
        name: String,
        reason: String,
    },

    #[error("Step {step}: column '{column}' does not exist at this point in the pipeline")]
    UnknownColumn { step: usize, column: String },

    #[error("Step {step}: column '{column}' is {found}, expected {expected}")]
    ColumnKindMismatch {
        step: usize,
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },

    #[error("Step {step}: output column '{column}' already exists (set overwrite to replace it)")]
    ColumnCollision { step: usize, column: String },

    #[error("Step {step}: cannot overwrite {existing} column '{column}' with {produced} output")]
    OverwriteKindConflict {
        step: usize,
        column: String,
        existing: ColumnKind,
        produced: ColumnKind,
    },

    #[error("Input column '{0}' not found in dataset")]
    UnknownInputColumn(String),

    #[error("Input column '{column}' is {kind}, expected text")]
    InputColumnNotText { column: String, kind: ColumnKind },

    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(i64),

    #[error("Output column '{0}' collides with an existing column")]
    OutputColumnCollision(String),

    #[error("Output column '{column}' is ambiguous: the last step produces {outputs} columns")]
    OutputColumnAmbiguous { column: String, outputs: usize },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "EMPTY_PIPELINE",
            Self::UnknownTransformationType { .. } => "UNKNOWN_TRANSFORMATION_TYPE",
            Self::MissingParameter { .. } => "MISSING_PARAMETER",
            Self::MalformedParameter { .. } => "MALFORMED_PARAMETER",
            Self::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            Self::ColumnKindMismatch { .. } => "COLUMN_KIND_MISMATCH",
            Self::ColumnCollision { .. } => "COLUMN_COLLISION",
            Self::OverwriteKindConflict { .. } => "OVERWRITE_KIND_CONFLICT",
            Self::UnknownInputColumn(_) => "UNKNOWN_INPUT_COLUMN",
            Self::InputColumnNotText { .. } => "INPUT_COLUMN_NOT_TEXT",
            Self::InvalidBatchSize(_) => "INVALID_BATCH_SIZE",
            Self::OutputColumnCollision(_) => "OUTPUT_COLUMN_COLLISION",
            Self::OutputColumnAmbiguous { .. } => "OUTPUT_COLUMN_AMBIGUOUS",
        }
    }

    /// The step this error refers to, if it is step-scoped.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::UnknownTransformationType { step, .. }
            | Self::MissingParameter { step, .. }
            | Self::MalformedParameter { step, .. }
            | Self::UnknownColumn { step, .. }
            | Self::ColumnKindMismatch { step, .. }
            | Self::ColumnCollision { step, .. }
            | Self::OverwriteKindConflict { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The column this error refers to, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::UnknownColumn { column, .. }
            | Self::ColumnKindMismatch { column, .. }
            | Self::ColumnCollision { column, .. }
            | Self::OverwriteKindConflict { column, .. }
            | Self::InputColumnNotText { column, .. }
            | Self::OutputColumnAmbiguous { column, .. } => Some(column),
            Self::UnknownInputColumn(column) | Self::OutputColumnCollision(column) => Some(column),
            _ => None,
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ValidationError", 4)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("step", &self.step())?;
        state.serialize_field("column", &self.column())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Every error found while validating one pipeline config, in discovery order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for error in &self.0 {
            seq.serialize_element(error)?;
        }
        seq.end()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<ValidationErrors> for PipelineError {
    fn from(errors: ValidationErrors) -> Self {
        PipelineError::Config(errors)
    }
}

/// Fatal errors raised while a pipeline is executing.
///
/// Any of these aborts the run and moves the job to `error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// A null cell in the declared input column. `row` is zero-based.
    #[error("Input column '{column}' has no text at row {row}")]
    NullInputText { column: String, row: usize },

    /// A vectorize step found no terms to build a vocabulary from.
    #[error("Step {step}: no terms found in column '{column}' to build a vocabulary")]
    EmptyVocabulary { step: usize, column: String },

    #[error("Column '{0}' not found in column store")]
    ColumnMissing(String),

    #[error("Column '{column}' is {found}, expected {expected}")]
    UnexpectedColumnKind {
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A column-wide step ran without its fitted model.
    #[error("No fitted model for column '{0}'")]
    NotFitted(String),

    #[error("Failed to load dataset: {0}")]
    DatasetLoad(String),

    #[error("Failed to write result artifact: {0}")]
    ArtifactWrite(String),
}

impl ExecutionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NullInputText { .. } => "NULL_INPUT_TEXT",
            Self::EmptyVocabulary { .. } => "EMPTY_VOCABULARY",
            Self::ColumnMissing(_) => "COLUMN_MISSING",
            Self::UnexpectedColumnKind { .. } => "UNEXPECTED_COLUMN_KIND",
            Self::RowCountMismatch { .. } => "ROW_COUNT_MISMATCH",
            Self::NotFitted(_) => "NOT_FITTED",
            Self::DatasetLoad(_) => "DATASET_LOAD_FAILED",
            Self::ArtifactWrite(_) => "ARTIFACT_WRITE_FAILED",
        }
    }
}

/// Errors from the transformation registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown transformation type '{0}'")]
    UnknownTransformationType(String),
}

impl RegistryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownTransformationType(_) => "UNKNOWN_TRANSFORMATION_TYPE",
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PipelineError::DatasetNotFound("f1".to_string()).error_code(),
            "DATASET_NOT_FOUND"
        );
        assert_eq!(
            PipelineError::from(ExecutionError::EmptyVocabulary {
                step: 2,
                column: "t".to_string()
            })
            .error_code(),
            "EMPTY_VOCABULARY"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::Concurrency {
            file_id: "f1".to_string(),
            state: JobState::Running,
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "CONCURRENCY_ERROR");
        assert_eq!(json["message"], "A job for 'f1' is already running");
    }

    #[test]
    fn test_config_error_serializes_items() {
        let errors = ValidationErrors::new(vec![
            ValidationError::UnknownColumn {
                step: 0,
                column: "text_tokens".to_string(),
            },
            ValidationError::InvalidBatchSize(0),
        ]);
        let error = PipelineError::Config(errors);
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["code"], "CONFIG_ERROR");
        assert_eq!(json["errors"][0]["code"], "UNKNOWN_COLUMN");
        assert_eq!(json["errors"][0]["step"], 0);
        assert_eq!(json["errors"][0]["column"], "text_tokens");
        assert!(json["errors"][1]["step"].is_null());
        assert!(error.is_rejection());
    }

    #[test]
    fn test_with_context() {
        let error = PipelineError::JobNotFound("f1".to_string()).with_context("During status");
        assert!(error.to_string().contains("During status"));
        assert_eq!(error.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_null_input_names_row() {
        let error = ExecutionError::NullInputText {
            column: "review".to_string(),
            row: 3,
        };
        assert_eq!(error.to_string(), "Input column 'review' has no text at row 3");
    }
}
