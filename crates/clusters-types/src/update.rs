//! Update events for polling consumers.
//!
//! Events are pushed after a race-free categorization and drained in bulk.
//! They live in memory only; a crash before the drain loses them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topic::{Categories, Summaries, Topic};

/// Categorization payload carried by an update event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateData {
    pub formatted: Categories,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summaries>,
}

/// "Topic changed" notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub session_id: String,
    pub topic_id: String,
    /// Display/ordering only
    pub timestamp: DateTime<Utc>,
    pub data: UpdateData,
    #[serde(default)]
    pub finished: bool,
}

impl UpdateEvent {
    /// Build an event from a freshly settled topic snapshot.
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            session_id: topic.session_id.clone(),
            topic_id: topic.topic_id.clone(),
            timestamp: Utc::now(),
            data: UpdateData {
                formatted: topic.result.clone().unwrap_or_default(),
                summary: topic.summaries.clone(),
            },
            finished: topic.finished,
        }
    }
}
