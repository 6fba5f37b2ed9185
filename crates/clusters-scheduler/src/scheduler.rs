//! Scheduler service wrapper around tokio-cron-scheduler.
//!
//! Jobs are registered with a 6-field cron expression and a timezone. Each
//! run goes through an [`OverlapGuard`] and reports into the shared
//! [`JobRegistry`]. Shutdown cancels the token handed to every job and waits
//! for in-flight runs up to the configured grace period.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use clusters_types::SchedulerSettings;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::overlap::{OverlapGuard, OverlapPolicy};
use crate::registry::{JobOutput, JobRegistry, JobResult};
use crate::SchedulerError;

const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Validate a 6-field cron expression (sec min hour day-of-month month day-of-week).
///
/// ```
/// use clusters_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("*/10 * * * * *").is_ok());
/// assert!(validate_cron_expression("0 30 4 * * *").is_ok());
/// assert!(validate_cron_expression("invalid").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| SchedulerError::InvalidCron(format!("'{}': {}", expr, e)))
}

/// Parse an IANA timezone name.
pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
    tz_str
        .parse()
        .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
}

/// Lifecycle owner for recurring jobs.
pub struct SchedulerService {
    scheduler: JobScheduler,
    settings: SchedulerSettings,
    registry: Arc<JobRegistry>,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a scheduler; it does not run jobs until `start()`.
    pub async fn new(settings: SchedulerSettings) -> Result<Self, SchedulerError> {
        parse_timezone(&settings.timezone)?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            settings,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!(jobs = self.registry.job_count(), "Scheduler started");
        Ok(())
    }

    /// Cancel jobs, wait for in-flight runs, then stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + Duration::from_secs(self.settings.shutdown_timeout_secs);
        while self.registry.any_running() {
            if Instant::now() >= deadline {
                warn!("Jobs still running at shutdown deadline");
                break;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");
        Ok(())
    }

    /// Token cancelled on shutdown; jobs check it between units of work.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Register a recurring job.
    ///
    /// * `timezone` - IANA name, or `None` for the configured default
    /// * `overlap` - what to do when a trigger fires during a run
    /// * `timeout` - optional upper bound on one run
    ///
    /// The job receives the shutdown token and returns stats for the
    /// registry, or an error message recorded as a failed run.
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        timeout: Option<Duration>,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, String>> + Send,
    {
        let tz = parse_timezone(timezone.unwrap_or(self.settings.timezone.as_str()))?;
        validate_cron_expression(cron_expr)?;

        self.registry.register(name, cron_expr);

        let job_name = name.to_string();
        let token = self.shutdown_token.clone();
        let registry = Arc::clone(&self.registry);
        let guard = Arc::new(OverlapGuard::new(overlap));

        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let name = job_name.clone();
            let token = token.clone();
            let registry = Arc::clone(&registry);
            let guard = Arc::clone(&guard);
            let job_fn = job_fn.clone();

            Box::pin(async move {
                if token.is_cancelled() {
                    return;
                }

                let Some(_run) = guard.try_acquire() else {
                    debug!(job = %name, "Previous run still active, skipping");
                    registry.record_complete(&name, JobResult::Skipped("overlap".into()), 0);
                    return;
                };

                registry.record_start(&name);
                let start = Instant::now();

                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, job_fn(token))
                        .await
                        .unwrap_or_else(|_| Err(format!("timed out after {:?}", limit))),
                    None => job_fn(token).await,
                };

                let elapsed_ms = start.elapsed().as_millis() as u64;
                match outcome {
                    Ok(output) => {
                        debug!(job = %name, duration_ms = elapsed_ms, "Job completed");
                        registry.record_complete_with_metadata(
                            &name,
                            JobResult::Success,
                            elapsed_ms,
                            output.metadata,
                        );
                    }
                    Err(e) => {
                        warn!(job = %name, duration_ms = elapsed_ms, error = %e, "Job failed");
                        registry.record_complete(&name, JobResult::Failed(e), elapsed_ms);
                    }
                }
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        info!(job = %name, uuid = %uuid, cron = %cron_expr, timezone = %tz.name(), "Job registered");

        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            shutdown_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_stop() {
        let mut scheduler = SchedulerService::new(settings()).await.unwrap();
        assert!(!scheduler.is_running());

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        let token = scheduler.shutdown_token();
        scheduler.shutdown().await.unwrap();
        assert!(!scheduler.is_running());
        assert!(token.is_cancelled());
        assert!(matches!(
            scheduler.shutdown().await,
            Err(SchedulerError::NotRunning)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_timezone_setting() {
        let result = SchedulerService::new(SchedulerSettings {
            timezone: "Invalid/Zone".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(SchedulerError::InvalidTimezone(_))));
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(validate_cron_expression("0 0 * * * *").is_ok());
        assert!(validate_cron_expression("*/10 * * * * *").is_ok());
        assert!(validate_cron_expression("0 0 0 * * SUN").is_ok());

        assert!(validate_cron_expression("invalid").is_err());
        assert!(validate_cron_expression("").is_err());
        assert!(validate_cron_expression("* * *").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("UTC").is_ok());
        assert!(parse_timezone("Europe/Berlin").is_ok());
        assert!(matches!(
            parse_timezone("Invalid/Zone"),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_job_records_runs() {
        let mut scheduler = SchedulerService::new(settings()).await.unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let uuid = scheduler
            .register_job(
                "counting",
                "*/1 * * * * *",
                None,
                OverlapPolicy::Skip,
                None,
                move |_token| {
                    let c = Arc::clone(&counter_clone);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(JobOutput::new().with_metadata("ticks", 1))
                    }
                },
            )
            .await
            .unwrap();
        assert!(!uuid.is_nil());
        assert!(scheduler.registry().is_registered("counting"));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await.unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 1);
        let status = scheduler.registry().get_status("counting").unwrap();
        assert!(status.run_count >= 1);
        assert_eq!(status.last_result, Some(JobResult::Success));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_job_rejects_bad_input() {
        let scheduler = SchedulerService::new(settings()).await.unwrap();

        let bad_cron = scheduler
            .register_job("bad", "invalid-cron", None, OverlapPolicy::Skip, None, |_t| async {
                Ok(JobOutput::new())
            })
            .await;
        assert!(matches!(bad_cron, Err(SchedulerError::InvalidCron(_))));

        let bad_tz = scheduler
            .register_job(
                "bad-tz",
                "0 0 * * * *",
                Some("Invalid/Timezone"),
                OverlapPolicy::Skip,
                None,
                |_t| async { Ok(JobOutput::new()) },
            )
            .await;
        assert!(matches!(bad_tz, Err(SchedulerError::InvalidTimezone(_))));
        assert!(!scheduler.registry().is_registered("bad"));
    }
}
