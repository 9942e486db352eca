//! Job lifecycle: states, the shared registry, durable status records and
//! the service that runs pipelines on background workers.

pub(crate) mod persist;
mod registry;
mod service;
mod state;

pub use persist::load_record;
pub use registry::JobRegistry;
pub use service::{PipelineService, PipelineServiceBuilder};
pub use state::{ErrorDetail, JobHandle, JobRecord, JobState, JobStatus};
