//! Predefined jobs registered by the daemon.
//!
//! - **sweep**: recurring reprocessing of pending topics
//! - **compaction**: periodic RocksDB compaction

pub mod compaction;
pub mod sweep;

pub use compaction::{create_compaction_job, CompactionJobConfig};
pub use sweep::{create_sweep_job, SWEEP_JOB_NAME};
