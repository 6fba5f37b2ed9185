//! # clusters-engine
//!
//! Turns a topic's snippets into labeled clusters.
//!
//! Pipeline:
//! 1. Embed every snippet ([`clusters_embeddings::EmbeddingModel`], on a blocking thread)
//! 2. Partition with seeded k-means++ ([`kmeans::KMeans`]); k comes from
//!    [`clusters_types::ClusterCountPolicy`]
//! 3. Title each non-empty partition ([`title::TitleResolver`]) and make
//!    labels unique with " (n)" suffixes
//! 4. Optionally summarize each category ([`summary::CategorySummarizer`])

pub mod engine;
pub mod error;
pub mod keywords;
pub mod kmeans;
pub mod llm;
pub mod summary;
pub mod title;

pub use engine::{llm_from_settings, ClusteringEngine, EmbeddingClusteringEngine};
pub use error::EngineError;
pub use llm::{ApiLlmClient, ApiLlmConfig, LlmClient, NoOpLlmClient};
pub use summary::CategorySummarizer;
pub use title::{
    CandidateTopicStrategy, KeywordTitleStrategy, LlmTitleStrategy, TitleResolver, TitleStrategy,
};
