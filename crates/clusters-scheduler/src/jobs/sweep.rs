//! Recurring sweep job.

use std::sync::Arc;

use tracing::info;

use crate::{OverlapPolicy, SchedulerError, SchedulerService, Sweeper};

/// Registry name of the sweep job.
pub const SWEEP_JOB_NAME: &str = "topic_sweep";

/// Register the sweep on the configured cron schedule.
///
/// Uses `OverlapPolicy::Skip`, so a slow pass is never doubled up by the
/// next trigger. The shutdown token is checked between topics.
pub async fn create_sweep_job(
    scheduler: &SchedulerService,
    sweeper: Arc<Sweeper>,
) -> Result<(), SchedulerError> {
    let cron = scheduler.settings().sweep_cron.clone();

    scheduler
        .register_job(
            SWEEP_JOB_NAME,
            &cron,
            None,
            OverlapPolicy::Skip,
            None,
            move |token| {
                let sweeper = Arc::clone(&sweeper);
                async move {
                    sweeper
                        .sweep_once(&token)
                        .await
                        .map(|report| report.to_job_output())
                        .map_err(|e| e.to_string())
                }
            },
        )
        .await?;

    info!(cron = %cron, "Registered sweep job");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoopForwarder, UpdateQueue};
    use async_trait::async_trait;
    use clusters_engine::{ClusteringEngine, EngineError};
    use clusters_storage::{Storage, TopicStore};
    use clusters_types::{Categories, SchedulerSettings};
    use std::time::Duration;
    use tempfile::TempDir;

    struct SingleLabel;

    #[async_trait]
    impl ClusteringEngine for SingleLabel {
        async fn categorize(&self, inputs: &[String]) -> Result<Categories, EngineError> {
            let mut result = Categories::new();
            result.insert("Everything".to_string(), inputs.to_vec());
            Ok(result)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sweep_job_processes_pending_topic() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let store = Arc::new(TopicStore::new(storage));
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "hello world").unwrap();

        let queue = Arc::new(UpdateQueue::new());
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&store),
            Arc::new(SingleLabel),
            Arc::clone(&queue),
            Arc::new(NoopForwarder),
        ));

        let mut scheduler = SchedulerService::new(SchedulerSettings {
            sweep_cron: "*/1 * * * * *".to_string(),
            shutdown_timeout_secs: 2,
            ..Default::default()
        })
        .await
        .unwrap();
        create_sweep_job(&scheduler, sweeper).await.unwrap();

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await.unwrap();

        assert!(store.read("s1", "t1").unwrap().processed);
        assert_eq!(queue.drain_all().len(), 1);

        let status = scheduler.registry().get_status(SWEEP_JOB_NAME).unwrap();
        assert!(status.run_count >= 1);
        assert_eq!(status.error_count, 0);
    }
}
