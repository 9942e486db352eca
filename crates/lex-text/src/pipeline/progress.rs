//! Progress reporting for pipeline execution.
//!
//! The executor emits a [`ProgressUpdate`] after every batch. The job
//! service forwards updates into the job registry so status polls see them;
//! embedders can attach their own [`ProgressReporter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_text::{ClosureProgressReporter, PipelineExecutor};
//! use std::sync::Arc;
//!
//! let executor = PipelineExecutor::new().with_reporter(Arc::new(
//!     ClosureProgressReporter::new(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     }),
//! ));
//! ```

use serde::{Deserialize, Serialize};

/// Phases of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading the dataset into the column store
    Loading,
    /// Running transformation steps batch by batch
    Executing,
    /// Writing the result artifact
    Writing,
    /// Job completed successfully
    Complete,
    /// Job failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Dataset",
            Self::Executing => "Running Pipeline",
            Self::Writing => "Writing Results",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of overall progress taken by this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.05,
            Self::Executing => 0.85,
            Self::Writing => 0.10,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Executing => 0.05,
            Self::Writing => 0.90,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Optional detail, e.g. "Step 2: stemming".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    /// Rows that have cleared every step so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_rows: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage without sub-stage info.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            processed_rows: None,
            total_rows: None,
        }
    }

    /// Creates a new progress update with sub-stage information.
    pub fn with_sub_stage(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sub_stage: Some(sub_stage.into()),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Attach row counters.
    pub fn with_rows(mut self, processed: usize, total: usize) -> Self {
        self.processed_rows = Some(processed);
        self.total_rows = Some(total);
        self
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            sub_stage: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            processed_rows: None,
            total_rows: None,
        }
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync`: jobs run on background worker
/// threads while the reporter is owned by whoever submitted them.
pub trait ProgressReporter: Send + Sync {
    /// Called after every batch. Keep it cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Executing, 0.5, "Running...");
        assert_eq!(update.stage, PipelineStage::Executing);
        assert!(update.sub_stage.is_none());
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.475).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_with_rows() {
        let update = ProgressUpdate::with_sub_stage(
            PipelineStage::Executing,
            "Step 1: tokenization",
            0.25,
            "Tokenizing",
        )
        .with_rows(250, 1000);
        assert_eq!(update.sub_stage, Some("Step 1: tokenization".to_string()));
        assert_eq!(update.processed_rows, Some(250));
        assert_eq!(update.total_rows, Some(1000));
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.stage, PipelineStage::Complete);
        assert_eq!(update.progress, 1.0);
        assert_eq!(update.stage_progress, 1.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            PipelineStage::Loading,
            PipelineStage::Executing,
            PipelineStage::Writing,
        ];
        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
        assert!((PipelineStage::Writing.base_progress() - 0.90).abs() < 1e-6);
    }

    #[test]
    fn test_closure_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(PipelineStage::Loading, 1.0, "Loaded"));
        });
        handle.join().expect("Thread should not panic");
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_update_json_serialization() {
        let update = ProgressUpdate::new(PipelineStage::Writing, 0.0, "Writing").with_rows(3, 3);
        let json = serde_json::to_string(&update).expect("Should serialize");

        assert!(json.contains("\"stage\":\"writing\""), "Stage should be snake_case");
        assert!(json.contains("\"processed_rows\":3"));
        assert!(!json.contains("sub_stage"));

        let deserialized: ProgressUpdate = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(deserialized, update);
    }
}
