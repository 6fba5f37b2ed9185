//! Request-level errors and their HTTP mapping.
//!
//! Every failure is rendered as `{"error": {"code": "...", "message": "..."}}`
//! with a stable code from [`ErrorCode`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clusters_storage::StoreError;
use clusters_types::ErrorCode;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Field absent, null or empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Body or query string could not be parsed
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::MissingField(_) | ServiceError::Malformed(_) => ErrorCode::InvalidInput,
            ServiceError::Store(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = json!({
            "error": {
                "code": self.code().as_str(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Treat absent, null and blank values alike.
pub fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ServiceError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusters_types::TopicKey;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::MissingField("text").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::from(StoreError::SessionNotFound("s1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::from(StoreError::AlreadyFinished(TopicKey::new("s1", "t1"))).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required("session_id", &None).is_err());
        assert!(required("session_id", &Some("   ".into())).is_err());
        assert_eq!(required("session_id", &Some(" s1 ".into())).unwrap(), "s1");
    }
}
