//! Configuration types for the text pipeline engine.
//!
//! This module provides engine-level options (where datasets live, where
//! results and status records go, batching defaults) using the builder
//! pattern for flexible and ergonomic setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of rows per batch when a pipeline does not set one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Serialization format of the result artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Delimited text; nested cells are encoded as compact JSON text
    #[default]
    Csv,
    /// One JSON object per row, nested cells as native JSON values
    Jsonl,
    /// Columnar; token, tag and vector cells become list columns
    Parquet,
}

impl ArtifactFormat {
    /// File extension used for artifacts in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
            Self::Parquet => "parquet",
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ArtifactFormat {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "parquet" | "pq" => Ok(Self::Parquet),
            other => Err(ConfigValidationError::UnknownArtifactFormat(
                other.to_string(),
            )),
        }
    }
}

/// Configuration for the pipeline engine.
///
/// Use [`EngineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_text::config::{ArtifactFormat, EngineConfig};
///
/// let config = EngineConfig::builder()
///     .uploads_dir("data/uploads")
///     .results_dir("data/processed")
///     .status_dir("data/status")
///     .artifact_format(ArtifactFormat::Jsonl)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding uploaded datasets named `{file_id}.{ext}` or
    /// `{file_id}_{original}.{ext}`.
    /// Default: "uploads"
    pub uploads_dir: PathBuf,

    /// Directory receiving `processed_{file_id}.*` artifacts.
    /// Default: "processed"
    pub results_dir: PathBuf,

    /// Directory for durable `processing_{file_id}.json` status records.
    /// When None, job records live in memory only.
    /// Default: None
    pub status_dir: Option<PathBuf>,

    /// Rows per batch when a pipeline config omits `batch_size`.
    /// Default: 1000
    pub default_batch_size: usize,

    /// Format of the result artifact.
    /// Default: Csv
    pub artifact_format: ArtifactFormat,

    /// Prefix for background worker thread names (`{prefix}-{file_id}`).
    /// Default: "lex-text-job"
    pub worker_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            results_dir: PathBuf::from("processed"),
            status_dir: None,
            default_batch_size: DEFAULT_BATCH_SIZE,
            artifact_format: ArtifactFormat::default(),
            worker_name_prefix: "lex-text-job".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_batch_size == 0 {
            return Err(ConfigValidationError::InvalidBatchSize(
                self.default_batch_size,
            ));
        }

        if self.uploads_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyPath {
                field: "uploads_dir".to_string(),
            });
        }

        if self.results_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyPath {
                field: "results_dir".to_string(),
            });
        }

        if let Some(dir) = &self.status_dir
            && dir.as_os_str().is_empty()
        {
            return Err(ConfigValidationError::EmptyPath {
                field: "status_dir".to_string(),
            });
        }

        if self.worker_name_prefix.trim().is_empty() {
            return Err(ConfigValidationError::EmptyWorkerPrefix);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid default batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Path for '{field}' must not be empty")]
    EmptyPath { field: String },

    #[error("Worker thread name prefix must not be empty")]
    EmptyWorkerPrefix,

    #[error("Unknown artifact format '{0}' (expected csv or jsonl)")]
    UnknownArtifactFormat(String),
}

/// Builder for [`EngineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    uploads_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
    status_dir: Option<PathBuf>,
    default_batch_size: Option<usize>,
    artifact_format: Option<ArtifactFormat>,
    worker_name_prefix: Option<String>,
}

impl EngineConfigBuilder {
    /// Set the directory uploaded datasets are read from.
    pub fn uploads_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.uploads_dir = Some(path.into());
        self
    }

    /// Set the directory result artifacts are written to.
    pub fn results_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(path.into());
        self
    }

    /// Enable durable status records in the given directory.
    pub fn status_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_dir = Some(path.into());
        self
    }

    /// Set the batch size used when a pipeline does not declare one.
    pub fn default_batch_size(mut self, rows: usize) -> Self {
        self.default_batch_size = Some(rows);
        self
    }

    /// Set the result artifact format.
    pub fn artifact_format(mut self, format: ArtifactFormat) -> Self {
        self.artifact_format = Some(format);
        self
    }

    /// Set the prefix used to name background worker threads.
    pub fn worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = Some(prefix.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EngineConfig` or an error if validation fails.
    pub fn build(self) -> Result<EngineConfig, ConfigValidationError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            uploads_dir: self.uploads_dir.unwrap_or(defaults.uploads_dir),
            results_dir: self.results_dir.unwrap_or(defaults.results_dir),
            status_dir: self.status_dir,
            default_batch_size: self
                .default_batch_size
                .unwrap_or(defaults.default_batch_size),
            artifact_format: self.artifact_format.unwrap_or_default(),
            worker_name_prefix: self
                .worker_name_prefix
                .unwrap_or(defaults.worker_name_prefix),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.results_dir, PathBuf::from("processed"));
        assert!(config.status_dir.is_none());
        assert_eq!(config.default_batch_size, 1000);
        assert_eq!(config.artifact_format, ArtifactFormat::Csv);
    }

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.default_batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.worker_name_prefix, "lex-text-job");
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .uploads_dir("in")
            .results_dir("out")
            .status_dir("status")
            .default_batch_size(64)
            .artifact_format(ArtifactFormat::Jsonl)
            .worker_name_prefix("nlp")
            .build()
            .unwrap();

        assert_eq!(config.uploads_dir, PathBuf::from("in"));
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.status_dir, Some(PathBuf::from("status")));
        assert_eq!(config.default_batch_size, 64);
        assert_eq!(config.artifact_format, ArtifactFormat::Jsonl);
        assert_eq!(config.worker_name_prefix, "nlp");
    }

    #[test]
    fn test_validation_zero_batch_size() {
        let result = EngineConfig::builder().default_batch_size(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidBatchSize(0)
        ));
    }

    #[test]
    fn test_validation_empty_paths() {
        let result = EngineConfig::builder().results_dir("").build();
        assert_eq!(
            result.unwrap_err(),
            ConfigValidationError::EmptyPath {
                field: "results_dir".to_string()
            }
        );

        let result = EngineConfig::builder().worker_name_prefix("  ").build();
        assert_eq!(result.unwrap_err(), ConfigValidationError::EmptyWorkerPrefix);
    }

    #[test]
    fn test_artifact_format_parsing() {
        assert_eq!("CSV".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Csv);
        assert_eq!("ndjson".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Jsonl);
        assert_eq!("Parquet".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Parquet);
        assert_eq!(ArtifactFormat::Parquet.extension(), "parquet");
        assert!("xlsx".parse::<ArtifactFormat>().is_err());
        assert_eq!(ArtifactFormat::Jsonl.to_string(), "jsonl");
    }

    #[test]
    fn test_engine_config_from_json() {
        let json = r#"{
            "uploads_dir": "uploads",
            "results_dir": "processed",
            "status_dir": "processed/status",
            "default_batch_size": 250,
            "artifact_format": "jsonl",
            "worker_name_prefix": "worker"
        }"#;

        let config: EngineConfig = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(config.status_dir, Some(PathBuf::from("processed/status")));
        assert_eq!(config.default_batch_size, 250);
        assert_eq!(config.artifact_format, ArtifactFormat::Jsonl);
        assert!(config.validate().is_ok());
    }
}
