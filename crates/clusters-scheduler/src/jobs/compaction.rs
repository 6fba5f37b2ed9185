//! RocksDB compaction job.
//!
//! Finished topics are moved rather than rewritten in place, so tombstones
//! accumulate in the active column family. A weekly compaction reclaims them.

use std::sync::Arc;
use std::time::Duration;

use clusters_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{JobOutput, OverlapPolicy, SchedulerError, SchedulerService};

/// Configuration for the compaction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionJobConfig {
    /// Cron expression (default: "0 0 4 * * 0" = 4 AM Sunday)
    pub cron: String,

    /// Timeout in seconds (default: 3600)
    pub timeout_secs: u64,
}

impl Default for CompactionJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 4 * * 0".to_string(),
            timeout_secs: 3600,
        }
    }
}

/// Register the compaction job in the scheduler's default timezone.
pub async fn create_compaction_job(
    scheduler: &SchedulerService,
    storage: Arc<Storage>,
    config: CompactionJobConfig,
) -> Result<(), SchedulerError> {
    scheduler
        .register_job(
            "rocksdb_compaction",
            &config.cron,
            None,
            OverlapPolicy::Skip,
            Some(Duration::from_secs(config.timeout_secs)),
            move |_token| {
                let storage = Arc::clone(&storage);
                async move {
                    info!("Starting manual compaction");
                    storage
                        .compact()
                        .map(|_| JobOutput::new())
                        .map_err(|e| e.to_string())
                }
            },
        )
        .await?;

    info!(cron = %config.cron, "Registered compaction job");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusters_types::SchedulerSettings;
    use tempfile::TempDir;

    #[test]
    fn test_compaction_config_default() {
        let config = CompactionJobConfig::default();
        assert_eq!(config.cron, "0 0 4 * * 0");
        assert_eq!(config.timeout_secs, 3600);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_compaction_job_registers() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let scheduler = SchedulerService::new(SchedulerSettings::default())
            .await
            .unwrap();

        create_compaction_job(&scheduler, storage, CompactionJobConfig::default())
            .await
            .unwrap();
        assert!(scheduler.registry().is_registered("rocksdb_compaction"));
    }
}
