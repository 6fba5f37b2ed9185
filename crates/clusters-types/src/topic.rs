//! Topic and session types.
//!
//! A topic is a growing, ordered list of text snippets plus the latest
//! categorization computed from it. Topics live inside a session namespace.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mapping from cluster label to its member snippets.
///
/// Members keep the order in which they appear in the topic's inputs.
pub type Categories = BTreeMap<String, Vec<String>>;

/// Mapping from cluster label to a one-sentence summary.
pub type Summaries = BTreeMap<String, String>;

/// Identity of a topic inside its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicKey {
    pub session_id: String,
    pub topic_id: String,
}

impl TopicKey {
    pub fn new(session_id: impl Into<String>, topic_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            topic_id: topic_id.into(),
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.topic_id)
    }
}

/// Processing state derived from the persisted `(processed, finished)` flags.
///
/// A topic whose result was written while inputs kept growing is stored as
/// `Pending` again; at rest it is indistinguishable from a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicState {
    /// Needs a (re)categorization pass
    Pending,
    /// Result matches the exact input snapshot it was computed from
    Settled,
    /// Sealed; no further inputs or processing
    Finished,
}

/// A session namespace record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// A named collection of text snippets and its latest categorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub session_id: String,
    pub topic_id: String,

    /// Contributed snippets in append order
    #[serde(default)]
    pub inputs: Vec<String>,

    /// False when the topic needs a (re)categorization pass
    #[serde(default)]
    pub processed: bool,

    /// Bumped on every mutation of `inputs`
    #[serde(default)]
    pub version: u64,

    /// Latest categorization, absent until the first pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Categories>,

    /// Per-category summaries, when summarization is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<Summaries>,

    #[serde(default)]
    pub finished: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Create an empty, pending topic.
    pub fn new(session_id: impl Into<String>, topic_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            topic_id: topic_id.into(),
            inputs: Vec::new(),
            processed: false,
            version: 0,
            result: None,
            summaries: None,
            finished: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> TopicKey {
        TopicKey::new(self.session_id.clone(), self.topic_id.clone())
    }

    pub fn state(&self) -> TopicState {
        if self.finished {
            TopicState::Finished
        } else if self.processed {
            TopicState::Settled
        } else {
            TopicState::Pending
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Append a snippet, marking the topic for reprocessing.
    pub fn push_input(&mut self, text: impl Into<String>) {
        self.inputs.push(text.into());
        self.version += 1;
        self.processed = false;
        self.updated_at = Utc::now();
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_is_pending_and_empty() {
        let topic = Topic::new("s1", "notes");
        assert_eq!(topic.state(), TopicState::Pending);
        assert!(topic.inputs.is_empty());
        assert_eq!(topic.version, 0);
        assert!(topic.result.is_none());
    }

    #[test]
    fn test_push_input_resets_processed() {
        let mut topic = Topic::new("s1", "notes");
        topic.processed = true;
        topic.push_input("a");
        topic.push_input("b");

        assert_eq!(topic.inputs, vec!["a", "b"]);
        assert_eq!(topic.version, 2);
        assert_eq!(topic.state(), TopicState::Pending);
    }

    #[test]
    fn test_finished_wins_over_processed() {
        let mut topic = Topic::new("s1", "notes");
        topic.processed = true;
        topic.finished = true;
        assert_eq!(topic.state(), TopicState::Finished);
    }

    #[test]
    fn test_topic_bytes_roundtrip_keeps_result() {
        let mut topic = Topic::new("s1", "notes");
        topic.push_input("a");
        let mut result = Categories::new();
        result.insert("X".to_string(), vec!["a".to_string()]);
        topic.result = Some(result.clone());

        let decoded = Topic::from_bytes(&topic.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.result, Some(result));
        assert_eq!(decoded.version, 1);
    }

    #[test]
    fn test_legacy_record_without_version_decodes() {
        let json = r#"{"session_id":"s1","topic_id":"t","inputs":["a"],
            "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let topic = Topic::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(topic.version, 0);
        assert!(!topic.processed);
        assert!(!topic.finished);
    }

    #[test]
    fn test_topic_key_display() {
        assert_eq!(TopicKey::new("s1", "notes").to_string(), "s1/notes");
    }
}
