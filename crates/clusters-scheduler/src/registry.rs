//! Job registry for tracking execution status.
//!
//! The HTTP status endpoint reads from here: last run, duration, result and
//! run/error counts for every registered job.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum JobResult {
    Success,
    Failed(String),
    /// Not executed, e.g. because the previous run was still active
    Skipped(String),
}

/// Key-value stats a job reports back to the registry.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub metadata: HashMap<String, String>,
}

impl JobOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    pub cron_expr: String,
    /// When the job last started (if ever)
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    /// Completed and skipped runs
    pub run_count: u64,
    pub error_count: u64,
    pub is_running: bool,
    #[serde(default)]
    pub last_run_metadata: HashMap<String, String>,
}

impl JobStatus {
    pub fn new(job_name: String, cron_expr: String) -> Self {
        Self {
            job_name,
            cron_expr,
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            is_running: false,
            last_run_metadata: HashMap::new(),
        }
    }
}

/// Thread-safe registry of job statuses.
///
/// ```
/// use clusters_scheduler::{JobRegistry, JobResult};
///
/// let registry = JobRegistry::new();
/// registry.register("topic_sweep", "*/10 * * * * *");
///
/// registry.record_start("topic_sweep");
/// assert!(registry.is_running("topic_sweep"));
///
/// registry.record_complete("topic_sweep", JobResult::Success, 120);
/// assert!(!registry.is_running("topic_sweep"));
/// ```
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job, replacing any previous entry with the same name.
    pub fn register(&self, job_name: &str, cron_expr: &str) {
        self.write().insert(
            job_name.to_string(),
            JobStatus::new(job_name.to_string(), cron_expr.to_string()),
        );
    }

    pub fn record_start(&self, job_name: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = true;
            status.last_run = Some(Utc::now());
        }
    }

    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        self.record_complete_with_metadata(job_name, result, duration_ms, HashMap::new());
    }

    /// Record completion along with stats reported by the job.
    pub fn record_complete_with_metadata(
        &self,
        job_name: &str,
        result: JobResult,
        duration_ms: u64,
        metadata: HashMap<String, String>,
    ) {
        let mut jobs = self.write();
        if let Some(status) = jobs.get_mut(job_name) {
            let skipped = matches!(result, JobResult::Skipped(_));
            if !skipped {
                // A skipped trigger leaves the active run's flag alone
                status.is_running = false;
                status.last_duration_ms = Some(duration_ms);
                status.last_run_metadata = metadata;
            }
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_)) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
        }
    }

    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.read().get(job_name).cloned()
    }

    /// All statuses, sorted by job name.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        all
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.read()
            .get(job_name)
            .map(|s| s.is_running)
            .unwrap_or(false)
    }

    /// Whether any registered job is executing.
    pub fn any_running(&self) -> bool {
        self.read().values().any(|s| s.is_running)
    }

    pub fn is_registered(&self, job_name: &str) -> bool {
        self.read().contains_key(job_name)
    }

    pub fn job_count(&self) -> usize {
        self.read().len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
