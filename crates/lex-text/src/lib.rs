//! Text Transformation Pipeline Library
//!
//! Runs ordered NLP transformation pipelines over a text column of an
//! uploaded dataset, as background jobs with pollable status.
//!
//! # Overview
//!
//! - **Transformation Units**: tokenization, stopword removal, lemmatization,
//!   stemming, part-of-speech tagging, TF-IDF/count vectorization and named
//!   entity recognition
//! - **Validation**: a pipeline is checked against the dataset schema before
//!   any job exists, and every problem is reported at once
//! - **Batched Execution**: rows are processed batch by batch with
//!   monotonic progress; vectorization fits on the whole column first
//! - **Jobs**: `queued -> running -> completed | error`, one active job per
//!   file id, optionally persisted as JSON status records
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_text::{EngineConfig, FileId, JobState, PipelineConfig, PipelineService};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let service = PipelineService::builder()
//!     .config(
//!         EngineConfig::builder()
//!             .uploads_dir("data/uploads")
//!             .results_dir("data/processed")
//!             .status_dir("data/status")
//!             .build()?,
//!     )
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let config = PipelineConfig::new("review")
//!     .step("tokenization", json!({"columns": ["review"]}))
//!     .step("stopword_removal", json!({"columns": ["review_tokens"]}))
//!     .step("text_vectorization", json!({"columns": ["review_tokens"], "method": "tfidf"}));
//!
//! let handle = service.submit(FileId::parse("abc123")?, config)?;
//! let status = service.wait_for_terminal(&handle.file_id, Duration::from_secs(60))?;
//! assert_eq!(status.state, JobState::Completed);
//! ```
//!
//! # Validation only
//!
//! ```rust,ignore
//! use lex_text::{validate, DatasetSchema, ColumnKind, PipelineConfig};
//!
//! let schema = DatasetSchema::new([("review", ColumnKind::Text)]);
//! match validate(&schema, &config, 1000) {
//!     Ok(plan) => println!("{} steps", plan.steps.len()),
//!     Err(errors) => errors.iter().for_each(|e| println!("{}", e)),
//! }
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod transforms;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use config::{ArtifactFormat, ConfigValidationError, EngineConfig, EngineConfigBuilder};
pub use error::{
    ExecutionError, PipelineError, RegistryError, Result as PipelineResult, ResultExt,
    ValidationError, ValidationErrors,
};
pub use jobs::{
    ErrorDetail, JobHandle, JobRecord, JobRegistry, JobState, JobStatus, PipelineService,
    PipelineServiceBuilder,
};
pub use pipeline::{
    ClosureProgressReporter, ExecutionOutcome, PipelineExecutor, PipelineStage, ProgressReporter,
    ProgressUpdate, ValidatedPipeline,
};
pub use storage::{
    ArtifactSink, DatasetSource, InMemoryDatasets, MemoryArtifacts, ResultDirectory,
    ResultManifest, ResultRef, UploadDirectory,
};
pub use store::{ColumnStore, DatasetSchema};
pub use transforms::registry::{descriptor, lookup, param_schema};
pub use types::{ColumnKind, FileId, PipelineConfig, TransformationKind, TransformationStep};
pub use validation::validate;
