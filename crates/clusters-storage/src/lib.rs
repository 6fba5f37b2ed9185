//! Storage layer for topic-clusters.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for sessions, active topics and finished topics
//! - Prefix-scannable string keys (`session:{id}`, `topic:{session}:{topic}`)
//! - Atomic moves between column families via WriteBatch
//! - [`TopicStore`], the text store with optimistic version checks

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod store;

pub use db::{Storage, StorageStats};
pub use error::{StorageError, StoreError};
pub use store::{StoreStats, TopicStore, WriteOutcome};
