//! Column family definitions for RocksDB.
//!
//! - sessions: session namespace records (default compaction)
//! - topics: active topics, rewritten on every append (default compaction)
//! - finished_topics: sealed topics, written once (compressed)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for session records
pub const CF_SESSIONS: &str = "sessions";

/// Column family name for active topics
pub const CF_TOPICS: &str = "topics";

/// Column family name for finished topics
pub const CF_FINISHED_TOPICS: &str = "finished_topics";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_SESSIONS, CF_TOPICS, CF_FINISHED_TOPICS];

/// Finished topics are never rewritten, so favour space over write speed
fn finished_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default()),
        ColumnFamilyDescriptor::new(CF_TOPICS, Options::default()),
        ColumnFamilyDescriptor::new(CF_FINISHED_TOPICS, finished_options()),
    ]
}
