//! Engine error types.

use std::time::Duration;

use clusters_embeddings::EmbeddingError;
use clusters_types::ErrorCode;
use thiserror::Error;

/// Errors from the embedding, partitioning and labeling steps.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    #[error("Clustering error: {0}")]
    Clustering(String),

    /// LLM request failed
    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("LLM rate limit exceeded")]
    RateLimited,

    /// LLM response could not be used
    #[error("LLM response parse error: {0}")]
    Parse(String),

    /// Background task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Config(_) => ErrorCode::Internal,
            _ => ErrorCode::CapabilityFailure,
        }
    }
}
