use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ExecutionError, PipelineError};
use crate::storage::ResultRef;
use crate::types::{FileId, PipelineConfig};

/// Lifecycle of a job: `queued -> running -> completed | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Terminal states are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// A queued or running job blocks new submissions for its file id.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Error)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    /// Zero-based row, for row-specific failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl ErrorDetail {
    pub const EXPIRED: &'static str = "EXPIRED";
    pub const INTERRUPTED: &'static str = "INTERRUPTED";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            row: None,
        }
    }
}

impl From<&ExecutionError> for ErrorDetail {
    fn from(error: &ExecutionError) -> Self {
        let row = match error {
            ExecutionError::NullInputText { row, .. } => Some(*row),
            _ => None,
        };
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            row,
        }
    }
}

impl From<&PipelineError> for ErrorDetail {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::Execution(inner) => inner.into(),
            other => Self::new(other.error_code(), other.to_string()),
        }
    }
}

/// Snapshot of a job returned by status reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub file_id: FileId,
    pub state: JobState,
    pub processed_rows: usize,
    /// Known once the worker has loaded the dataset.
    pub total_rows: Option<usize>,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Durable record of a job: its status plus the submitted config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub status: JobStatus,
    pub config: PipelineConfig,
    /// Bumped on every change; older snapshots are never persisted over newer ones.
    pub revision: u64,
}

impl JobRecord {
    pub fn queued(file_id: FileId, config: PipelineConfig) -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus {
                file_id,
                state: JobState::Queued,
                processed_rows: 0,
                total_rows: None,
                progress: 0.0,
                message: "Queued".to_string(),
                result: None,
                error: None,
                submitted_at: now,
                started_at: None,
                finished_at: None,
                updated_at: now,
            },
            config,
            revision: 0,
        }
    }
}

/// Returned by a successful submission.
///
/// `generation` identifies this submission among all jobs ever queued for
/// the file id. Worker-side registry calls carry it, so a worker whose job
/// was expired and replaced cannot touch the replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub file_id: FileId,
    pub generation: u64,
    pub submitted_at: DateTime<Utc>,
}
