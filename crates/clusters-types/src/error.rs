//! Error types shared across the topic-clusters system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for configuration and encoding failures.
#[derive(Debug, Error)]
pub enum ClustersError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable error codes returned to callers in error payloads.
///
/// The string form is part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown session or topic
    NotFound,
    /// Double-finish or double-create of an active topic
    Conflict,
    /// Missing or malformed request field
    InvalidInput,
    /// Embedding, clustering or labeling backend failed
    CapabilityFailure,
    /// Downstream forwarding or event push failed
    DeliveryFailure,
    /// Anything else (storage faults, encoding errors)
    Internal,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::CapabilityFailure => "capability_failure",
            ErrorCode::DeliveryFailure => "delivery_failure",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
