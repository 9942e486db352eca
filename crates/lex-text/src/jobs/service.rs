//! Pipeline service: submission, background workers and status reads.
//!
//! `submit` validates synchronously and returns as soon as the job is
//! queued. Each job then runs on its own named worker thread, which talks
//! to the outside world only through the [`JobRegistry`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ArtifactFormat, EngineConfig};
use crate::error::{ExecutionError, PipelineError, Result};
use crate::jobs::{ErrorDetail, JobHandle, JobRegistry, JobStatus};
use crate::pipeline::{
    ClosureProgressReporter, PipelineExecutor, PipelineStage, ProgressReporter, ProgressUpdate,
    ValidatedPipeline,
};
use crate::storage::{
    ArtifactSink, DatasetSource, ResultDirectory, ResultManifest, ResultRef, UploadDirectory,
};
use crate::store::ColumnStore;
use crate::types::{FileId, PipelineConfig};
use crate::validation;

/// Forwards executor progress into the registry, then to an optional
/// downstream reporter.
struct JobReporter {
    job: JobHandle,
    registry: Arc<JobRegistry>,
    downstream: Option<Arc<dyn ProgressReporter>>,
}

impl ProgressReporter for JobReporter {
    fn report(&self, update: ProgressUpdate) {
        let file_id = &self.job.file_id;
        match self.registry.record_progress(&self.job, &update) {
            Ok(true) => {}
            Ok(false) => debug!("Ignoring progress for inactive job '{}'", file_id),
            Err(e) => warn!("Failed to record progress for '{}': {}", file_id, e),
        }
        if let Some(downstream) = &self.downstream {
            downstream.report(update);
        }
    }
}

/// Everything one background job needs.
struct JobWorker {
    job: JobHandle,
    plan: ValidatedPipeline,
    format: ArtifactFormat,
    registry: Arc<JobRegistry>,
    datasets: Arc<dyn DatasetSource>,
    artifacts: Arc<dyn ArtifactSink>,
    reporter: Arc<JobReporter>,
}

fn dataset_load_error(error: PipelineError) -> PipelineError {
    match error {
        PipelineError::Execution(_) => error,
        other => ExecutionError::DatasetLoad(other.to_string()).into(),
    }
}

impl JobWorker {
    fn run(self) {
        let file_id = &self.job.file_id;
        if let Err(e) = self.registry.claim(&self.job) {
            warn!("Worker could not claim job '{}': {}", file_id, e);
            return;
        }
        info!("Job '{}' started", file_id);

        match self.execute() {
            Ok(result) => {
                let rows = result.rows;
                match self.registry.complete(&self.job, result) {
                    Ok(_) => {
                        if let Some(downstream) = &self.reporter.downstream {
                            downstream.report(
                                ProgressUpdate::complete("Completed").with_rows(rows, rows),
                            );
                        }
                    }
                    Err(e) => warn!("Discarding late result for '{}': {}", file_id, e),
                }
            }
            Err(e) => {
                if let Some(downstream) = &self.reporter.downstream {
                    downstream.report(ProgressUpdate::failed(e.to_string()));
                }
                if let Err(e) = self.registry.fail(&self.job, ErrorDetail::from(&e)) {
                    warn!("Could not record failure for '{}': {}", file_id, e);
                }
            }
        }
    }

    fn execute(&self) -> Result<ResultRef> {
        let reporter = self.reporter.as_ref();
        reporter.report(ProgressUpdate::new(PipelineStage::Loading, 0.0, "Loading dataset"));

        let file_id = &self.job.file_id;
        let df = self.datasets.load(file_id).map_err(dataset_load_error)?;
        let store = ColumnStore::from_dataframe(&df).map_err(dataset_load_error)?;
        drop(df);
        let rows = store.rows();
        self.registry.set_total_rows(&self.job, rows)?;
        reporter.report(
            ProgressUpdate::new(PipelineStage::Loading, 1.0, format!("Loaded {} rows", rows))
                .with_rows(0, rows),
        );

        let executor = PipelineExecutor::new().with_reporter(self.reporter.clone());
        let outcome = executor.run(store, &self.plan)?;

        reporter.report(
            ProgressUpdate::new(PipelineStage::Writing, 0.0, "Writing result").with_rows(rows, rows),
        );
        let manifest = ResultManifest::new(
            file_id.clone(),
            self.format,
            &outcome.store,
            outcome.vocabularies,
        );
        let result = self
            .artifacts
            .write(file_id, &outcome.store, &manifest)
            .map_err(|e| ExecutionError::ArtifactWrite(e.to_string()))?;
        reporter.report(
            ProgressUpdate::new(PipelineStage::Writing, 1.0, "Result written").with_rows(rows, rows),
        );
        Ok(result)
    }
}

/// Entry point for submitting pipelines and reading job state.
///
/// # Example
///
/// ```rust,ignore
/// use lex_text::{EngineConfig, FileId, PipelineConfig, PipelineService};
/// use serde_json::json;
///
/// let service = PipelineService::builder()
///     .config(EngineConfig::builder().uploads_dir("uploads").build()?)
///     .build()?;
///
/// let config = PipelineConfig::new("review")
///     .step("tokenization", json!({"columns": ["review"]}));
/// let handle = service.submit(FileId::parse("f1")?, config)?;
/// let status = service.status(&handle.file_id)?;
/// ```
pub struct PipelineService {
    config: EngineConfig,
    registry: Arc<JobRegistry>,
    datasets: Arc<dyn DatasetSource>,
    artifacts: Arc<dyn ArtifactSink>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    pub fn builder() -> PipelineServiceBuilder {
        PipelineServiceBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Validate `config` against the dataset without creating a job.
    pub fn validate(&self, file_id: &FileId, config: &PipelineConfig) -> Result<ValidatedPipeline> {
        let schema = self.datasets.schema(file_id)?;
        Ok(validation::validate(
            &schema,
            config,
            self.config.default_batch_size,
        )?)
    }

    /// Validate and queue a pipeline run, then start its worker.
    ///
    /// Fails without touching any job when a job for `file_id` is queued or
    /// running, when the dataset is missing, or when validation fails.
    pub fn submit(&self, file_id: FileId, config: PipelineConfig) -> Result<JobHandle> {
        if let Ok(existing) = self.registry.status(&file_id)
            && existing.state.is_active()
        {
            return Err(PipelineError::Concurrency {
                file_id: file_id.to_string(),
                state: existing.state,
            });
        }

        let plan = self.validate(&file_id, &config)?;
        let job = self.registry.enqueue(file_id.clone(), config)?;
        info!(
            "Submitted job '{}': {} steps, batch size {}",
            file_id,
            plan.steps.len(),
            plan.batch_size
        );

        let worker = JobWorker {
            job: job.clone(),
            plan,
            format: self.config.artifact_format,
            registry: self.registry.clone(),
            datasets: self.datasets.clone(),
            artifacts: self.artifacts.clone(),
            reporter: Arc::new(JobReporter {
                job: job.clone(),
                registry: self.registry.clone(),
                downstream: self.reporter.clone(),
            }),
        };

        let spawned = std::thread::Builder::new()
            .name(format!("{}-{}", self.config.worker_name_prefix, file_id))
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            let message = format!("Failed to start worker: {}", e);
            self.registry
                .fail(&job, ErrorDetail::new("INTERNAL_ERROR", message.clone()))?;
            return Err(PipelineError::Internal(message));
        }

        Ok(job)
    }

    pub fn status(&self, file_id: &FileId) -> Result<JobStatus> {
        self.registry.status(file_id)
    }

    pub fn result(&self, file_id: &FileId) -> Result<ResultRef> {
        self.registry.result(file_id)
    }

    pub fn expire(&self, file_id: &FileId, reason: &str) -> Result<JobStatus> {
        self.registry.expire(file_id, reason)
    }

    pub fn wait_for_terminal(&self, file_id: &FileId, timeout: Duration) -> Result<JobStatus> {
        self.registry.wait_for_terminal(file_id, timeout)
    }
}

/// Builder for [`PipelineService`].
#[derive(Default)]
pub struct PipelineServiceBuilder {
    config: Option<EngineConfig>,
    registry: Option<Arc<JobRegistry>>,
    datasets: Option<Arc<dyn DatasetSource>>,
    artifacts: Option<Arc<dyn ArtifactSink>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineServiceBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing registry instead of opening one from the config.
    pub fn registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Dataset source. Default: an [`UploadDirectory`] over `uploads_dir`.
    pub fn datasets(mut self, datasets: impl DatasetSource + 'static) -> Self {
        self.datasets = Some(Arc::new(datasets));
        self
    }

    /// Artifact sink. Default: a [`ResultDirectory`] over `results_dir`.
    pub fn artifacts(mut self, artifacts: impl ArtifactSink + 'static) -> Self {
        self.artifacts = Some(Arc::new(artifacts));
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Receive every progress update of every job.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.reporter(Arc::new(ClosureProgressReporter::new(callback)))
    }

    pub fn build(self) -> Result<PipelineService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let registry = match (self.registry, &config.status_dir) {
            (Some(registry), _) => registry,
            (None, Some(dir)) => Arc::new(JobRegistry::open(dir)?),
            (None, None) => Arc::new(JobRegistry::in_memory()),
        };
        let datasets = self
            .datasets
            .unwrap_or_else(|| Arc::new(UploadDirectory::new(&config.uploads_dir)));
        let artifacts = self
            .artifacts
            .unwrap_or_else(|| Arc::new(ResultDirectory::new(&config.results_dir)));

        Ok(PipelineService {
            config,
            registry,
            datasets,
            artifacts,
            reporter: self.reporter,
        })
    }
}

static_assertions::assert_impl_all!(PipelineService: Send, Sync);
