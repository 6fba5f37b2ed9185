//! # clusters-types
//!
//! Shared domain types for the topic-clusters system.
//!
//! This crate defines the core data structures used throughout the system:
//! - Topics: growing collections of text snippets plus their categorization
//! - Sessions: namespaces grouping topics
//! - Update events: "topic changed" notifications for polling consumers
//! - Settings: layered configuration for the daemon and its components
//!
//! ## Usage
//!
//! ```rust
//! use clusters_types::{Topic, TopicState};
//!
//! let topic = Topic::new("s1", "notes");
//! assert_eq!(topic.state(), TopicState::Pending);
//! ```

pub mod config;
pub mod error;
pub mod topic;
pub mod update;

pub use config::{
    ClusterCountPolicy, EmbeddingBackend, EmbeddingSettings, EngineConfig, ForwardSettings,
    LabelingConfig, LlmSettings, SchedulerSettings, Settings, SummaryConfig,
};
pub use error::{ClustersError, ErrorCode};
pub use topic::{Categories, Session, Summaries, Topic, TopicKey, TopicState};
pub use update::{UpdateData, UpdateEvent};
