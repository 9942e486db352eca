//! Job registry.
//!
//! The registry is the only state shared between submitters, workers and
//! status readers. Each job lives in a slot holding an `Arc<JobRecord>`
//! snapshot behind a short-lived write lock plus an atomic row counter.
//! Readers clone the current snapshot; writers clone, mutate and swap it,
//! then flush the new snapshot to disk outside the lock.
//!
//! Every enqueue starts a new generation for its file id. Worker-side
//! calls take the [`JobHandle`] they were given and are rejected once that
//! generation is no longer current.

use chrono::Utc;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::jobs::persist::StatusStore;
use crate::jobs::{ErrorDetail, JobHandle, JobRecord, JobState, JobStatus};
use crate::pipeline::ProgressUpdate;
use crate::storage::ResultRef;
use crate::types::{FileId, PipelineConfig};

struct JobSlot {
    generation: u64,
    record: RwLock<Arc<JobRecord>>,
    processed_rows: AtomicUsize,
    /// Highest revision whose flush has been attempted.
    flushed: AtomicU64,
}

impl JobSlot {
    fn new(record: JobRecord) -> Self {
        Self {
            generation: record.revision,
            processed_rows: AtomicUsize::new(record.status.processed_rows),
            flushed: AtomicU64::new(0),
            record: RwLock::new(Arc::new(record)),
        }
    }

    fn status_of(&self, record: &JobRecord) -> JobStatus {
        let mut status = record.status.clone();
        status.processed_rows = status
            .processed_rows
            .max(self.processed_rows.load(Ordering::Acquire));
        status
    }

    fn snapshot(&self) -> JobStatus {
        let record = self.record.read().clone();
        self.status_of(&record)
    }

    /// Snapshot plus whether that snapshot has already been flushed.
    fn settled_snapshot(&self) -> (JobStatus, bool) {
        let record = self.record.read().clone();
        let flushed = self.flushed.load(Ordering::Acquire) >= record.revision;
        (self.status_of(&record), flushed)
    }
}

struct Persistence {
    store: StatusStore,
    /// Highest revision written per file id.
    written: Mutex<HashMap<FileId, u64>>,
}

/// Registry of jobs keyed by file id.
pub struct JobRegistry {
    jobs: RwLock<HashMap<FileId, Arc<JobSlot>>>,
    persistence: Option<Persistence>,
    changed_lock: Mutex<()>,
    changed: Condvar,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.read().len())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn transition(record: &mut JobRecord, to: JobState) -> Result<()> {
    let from = record.status.state;
    if !from.can_transition_to(to) {
        return Err(PipelineError::InvalidTransition {
            file_id: record.status.file_id.to_string(),
            from,
            to,
        });
    }
    record.status.state = to;
    Ok(())
}

fn mark_error(record: &mut JobRecord, detail: ErrorDetail) -> Result<()> {
    transition(record, JobState::Error)?;
    record.status.message = detail.message.clone();
    record.status.error = Some(detail);
    record.status.finished_at = Some(Utc::now());
    Ok(())
}

impl JobRegistry {
    /// A registry whose records live only in memory.
    pub fn in_memory() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            persistence: None,
            changed_lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Open a registry persisted under `dir`, reloading existing records.
    /// Jobs a previous process left queued or running are moved to `error`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = StatusStore::open(dir)?;
        let records = store.load_all()?;

        let mut jobs = HashMap::with_capacity(records.len());
        let mut written = HashMap::with_capacity(records.len());
        let mut recovered = 0;
        for mut record in records {
            if record.status.state.is_active() {
                mark_error(
                    &mut record,
                    ErrorDetail::new(ErrorDetail::INTERRUPTED, "interrupted by restart"),
                )?;
                record.revision += 1;
                record.status.updated_at = Utc::now();
                if let Err(e) = store.save(&record) {
                    warn!(
                        "Failed to persist recovered job '{}': {}",
                        record.status.file_id, e
                    );
                }
                recovered += 1;
            }
            written.insert(record.status.file_id.clone(), record.revision);
            let slot = JobSlot::new(record);
            slot.flushed.store(u64::MAX, Ordering::Release);
            let file_id = slot.record.read().status.file_id.clone();
            jobs.insert(file_id, Arc::new(slot));
        }

        info!(
            "Loaded {} job records ({} interrupted by restart)",
            jobs.len(),
            recovered
        );
        Ok(Self {
            jobs: RwLock::new(jobs),
            persistence: Some(Persistence {
                store,
                written: Mutex::new(written),
            }),
            changed_lock: Mutex::new(()),
            changed: Condvar::new(),
        })
    }

    fn slot(&self, file_id: &FileId) -> Result<Arc<JobSlot>> {
        self.jobs
            .read()
            .get(file_id)
            .cloned()
            .ok_or_else(|| PipelineError::JobNotFound(file_id.to_string()))
    }

    /// Write `record` unless a newer revision is already on disk, then mark
    /// the slot flushed up to it.
    fn persist(&self, slot: &JobSlot, record: &JobRecord) {
        if let Some(persistence) = &self.persistence {
            let mut written = persistence.written.lock();
            let file_id = &record.status.file_id;
            let stale = written.get(file_id).is_some_and(|&rev| rev >= record.revision);
            if !stale {
                match persistence.store.save(record) {
                    Ok(()) => {
                        written.insert(file_id.clone(), record.revision);
                    }
                    Err(e) => warn!("Failed to persist status for '{}': {}", file_id, e),
                }
            }
        }
        slot.flushed.fetch_max(record.revision, Ordering::AcqRel);
    }

    fn notify(&self) {
        let _guard = self.changed_lock.lock();
        self.changed.notify_all();
    }

    /// Clone-mutate-swap the current record of `file_id`, then flush it.
    /// With a `generation`, the write only applies to that submission.
    fn update<F>(&self, file_id: &FileId, generation: Option<u64>, mutate: F) -> Result<Arc<JobRecord>>
    where
        F: FnOnce(&mut JobRecord, &AtomicUsize) -> Result<()>,
    {
        let slot = self.slot(file_id)?;
        if let Some(generation) = generation
            && generation != slot.generation
        {
            return Err(PipelineError::Superseded {
                file_id: file_id.to_string(),
                generation,
            });
        }

        let next = {
            let mut guard = slot.record.write();
            let mut next = (**guard).clone();
            mutate(&mut next, &slot.processed_rows)?;
            next.revision += 1;
            next.status.updated_at = Utc::now();
            let next = Arc::new(next);
            *guard = next.clone();
            next
        };
        self.persist(&slot, &next);
        self.notify();
        Ok(next)
    }

    /// Create a queued job. Fails if a job for `file_id` is queued or
    /// running; a terminal job is replaced by a new generation.
    pub fn enqueue(&self, file_id: FileId, config: PipelineConfig) -> Result<JobHandle> {
        let (slot, record) = {
            let mut jobs = self.jobs.write();
            let mut record = JobRecord::queued(file_id.clone(), config);
            if let Some(existing) = jobs.get(&file_id) {
                let current = existing.record.read().clone();
                if current.status.state.is_active() {
                    return Err(PipelineError::Concurrency {
                        file_id: file_id.to_string(),
                        state: current.status.state,
                    });
                }
                record.revision = current.revision + 1;
            }
            let slot = Arc::new(JobSlot::new(record.clone()));
            jobs.insert(file_id, slot.clone());
            (slot, record)
        };

        debug!(
            "Job '{}' queued (generation {})",
            record.status.file_id, slot.generation
        );
        self.persist(&slot, &record);
        self.notify();
        Ok(JobHandle {
            file_id: record.status.file_id,
            generation: slot.generation,
            submitted_at: record.status.submitted_at,
        })
    }

    /// Move a queued job to running. Claiming twice fails.
    pub fn claim(&self, job: &JobHandle) -> Result<JobStatus> {
        let record = self.update(&job.file_id, Some(job.generation), |record, _| {
            transition(record, JobState::Running)?;
            record.status.started_at = Some(Utc::now());
            record.status.message = "Running".to_string();
            Ok(())
        })?;
        Ok(record.status.clone())
    }

    pub fn set_total_rows(&self, job: &JobHandle, rows: usize) -> Result<()> {
        self.update(&job.file_id, Some(job.generation), |record, _| {
            record.status.total_rows = Some(rows);
            Ok(())
        })
        .map(drop)
    }

    /// Apply a progress update to a running job. Returns false (and changes
    /// nothing) when the job is not running or has been superseded.
    pub fn record_progress(&self, job: &JobHandle, update: &ProgressUpdate) -> Result<bool> {
        let result = self.update(&job.file_id, Some(job.generation), |record, counter| {
            if record.status.state != JobState::Running {
                return Err(PipelineError::InvalidTransition {
                    file_id: record.status.file_id.to_string(),
                    from: record.status.state,
                    to: JobState::Running,
                });
            }
            if let Some(processed) = update.processed_rows {
                let previous = counter.fetch_max(processed, Ordering::AcqRel);
                record.status.processed_rows = previous.max(processed);
            }
            if let Some(total) = update.total_rows {
                record.status.total_rows = Some(total);
            }
            record.status.progress = record.status.progress.max(update.progress);
            record.status.message = update.message.clone();
            Ok(())
        });

        match result {
            Ok(_) => Ok(true),
            Err(PipelineError::InvalidTransition { .. } | PipelineError::Superseded { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Move a running job to completed.
    pub fn complete(&self, job: &JobHandle, result: ResultRef) -> Result<JobStatus> {
        let record = self.update(&job.file_id, Some(job.generation), |record, counter| {
            transition(record, JobState::Completed)?;
            let rows = record.status.total_rows.unwrap_or(result.rows);
            counter.fetch_max(rows, Ordering::AcqRel);
            record.status.processed_rows = rows;
            record.status.total_rows = Some(rows);
            record.status.progress = 1.0;
            record.status.message = "Completed".to_string();
            record.status.result = Some(result);
            record.status.finished_at = Some(Utc::now());
            Ok(())
        })?;
        info!("Job '{}' completed", job.file_id);
        Ok(record.status.clone())
    }

    /// Move a queued or running job to error.
    pub fn fail(&self, job: &JobHandle, detail: ErrorDetail) -> Result<JobStatus> {
        self.fail_current(&job.file_id, Some(job.generation), detail)
    }

    /// Force the current job of `file_id` to error, whichever submission it
    /// is. A later completion from its worker is rejected.
    pub fn expire(&self, file_id: &FileId, reason: &str) -> Result<JobStatus> {
        self.fail_current(file_id, None, ErrorDetail::new(ErrorDetail::EXPIRED, reason))
    }

    fn fail_current(
        &self,
        file_id: &FileId,
        generation: Option<u64>,
        detail: ErrorDetail,
    ) -> Result<JobStatus> {
        let record = self.update(file_id, generation, |record, _| mark_error(record, detail))?;
        if let Some(error) = &record.status.error {
            warn!("Job '{}' failed: {}", file_id, error.message);
        }
        Ok(record.status.clone())
    }

    /// Current status snapshot. Reading has no side effects.
    pub fn status(&self, file_id: &FileId) -> Result<JobStatus> {
        self.slot(file_id).map(|slot| slot.snapshot())
    }

    /// The submitted config of a job.
    pub fn config(&self, file_id: &FileId) -> Result<PipelineConfig> {
        let slot = self.slot(file_id)?;
        let record = slot.record.read().clone();
        Ok(record.config.clone())
    }

    /// Result of a completed job.
    pub fn result(&self, file_id: &FileId) -> Result<ResultRef> {
        let status = self.status(file_id)?;
        match (status.state, status.result) {
            (JobState::Completed, Some(result)) => Ok(result),
            (state, _) => Err(PipelineError::NotReady {
                file_id: file_id.to_string(),
                state,
            }),
        }
    }

    pub fn file_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.jobs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Block until the job is terminal (and that state has been flushed) or
    /// `timeout` elapses, returning the latest status either way.
    pub fn wait_for_terminal(&self, file_id: &FileId, timeout: Duration) -> Result<JobStatus> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.changed_lock.lock();
        loop {
            let (status, flushed) = self.slot(file_id)?.settled_snapshot();
            if status.state.is_terminal() && flushed {
                return Ok(status);
            }
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return self.status(file_id);
            }
        }
    }
}

static_assertions::assert_impl_all!(JobRegistry: Send, Sync);
