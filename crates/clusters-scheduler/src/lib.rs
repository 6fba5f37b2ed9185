//! Background reprocessing for topic-clusters.
//!
//! A cron-driven sweep finds pending topics, categorizes them, and writes
//! results back under the store's version compare. Settled results are
//! pushed to an in-memory [`UpdateQueue`] and forwarded downstream.
//!
//! # Example
//!
//! ```ignore
//! use clusters_scheduler::{create_sweep_job, SchedulerService, Sweeper};
//!
//! let scheduler = SchedulerService::new(settings.scheduler.clone()).await?;
//! let sweeper = Arc::new(Sweeper::new(store, engine, queue, forwarder));
//! create_sweep_job(&scheduler, sweeper).await?;
//!
//! scheduler.start().await?;
//! ```

mod error;
mod forward;
pub mod jobs;
mod overlap;
mod registry;
mod scheduler;
mod sweep;
mod updates;

pub use error::SchedulerError;
pub use forward::{forwarder_from_settings, ForwardPayload, Forwarder, HttpForwarder, NoopForwarder};
pub use jobs::{create_compaction_job, create_sweep_job, CompactionJobConfig, SWEEP_JOB_NAME};
pub use overlap::{OverlapGuard, OverlapPolicy, RunGuard};
pub use registry::{JobOutput, JobRegistry, JobResult, JobStatus};
pub use scheduler::{parse_timezone, validate_cron_expression, SchedulerService};
pub use sweep::{SweepReport, Sweeper, TopicOutcome};
pub use updates::UpdateQueue;
