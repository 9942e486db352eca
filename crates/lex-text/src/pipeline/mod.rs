//! Pipeline module.
//!
//! This module provides the validated plan, the batched executor and
//! progress reporting.

mod executor;
pub mod plan;
pub mod progress;

pub use executor::{ExecutionOutcome, PipelineExecutor};
pub use plan::{ColumnBinding, PlannedStep, StepOp, ValidatedPipeline};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
