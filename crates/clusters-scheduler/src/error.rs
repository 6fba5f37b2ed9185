//! Error types for the scheduler crate.
//!
//! Covers cron and timezone validation, scheduler lifecycle, store access
//! during sweeps, and downstream delivery.

use clusters_storage::StoreError;
use clusters_types::ErrorCode;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Error from the underlying tokio-cron-scheduler
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Invalid cron expression
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid timezone string
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Scheduler is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler is not running")]
    NotRunning,

    /// Store access failed while sweeping
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Downstream consumer did not accept a result
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl SchedulerError {
    /// Stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SchedulerError::Store(e) => e.code(),
            SchedulerError::Delivery(_) => ErrorCode::DeliveryFailure,
            SchedulerError::InvalidCron(_) | SchedulerError::InvalidTimezone(_) => {
                ErrorCode::InvalidInput
            }
            _ => ErrorCode::Internal,
        }
    }
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Scheduler(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::InvalidCron("bad expression".to_string());
        assert!(err.to_string().contains("Invalid cron expression"));

        let err = SchedulerError::InvalidTimezone("Bad/Zone".to_string());
        assert!(err.to_string().contains("Invalid timezone"));

        let err = SchedulerError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = SchedulerError::Delivery("HTTP 503".to_string());
        assert!(err.to_string().contains("Delivery failed"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SchedulerError::Delivery("x".into()).code(),
            ErrorCode::DeliveryFailure
        );
        assert_eq!(
            SchedulerError::InvalidCron("x".into()).code(),
            ErrorCode::InvalidInput
        );
        assert_eq!(SchedulerError::NotRunning.code(), ErrorCode::Internal);
    }
}
