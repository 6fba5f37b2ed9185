//! Text store for topics.
//!
//! Persists sessions and topics in RocksDB column families. Every
//! read-modify-write sequence takes the store's write lock, so a
//! `write_result` compare is atomic relative to `append`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use clusters_types::{Categories, Session, Summaries, Topic, TopicKey};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::column_families::{CF_FINISHED_TOPICS, CF_SESSIONS, CF_TOPICS};
use crate::db::Storage;
use crate::error::StoreError;
use crate::keys::{session_key, topic_key, TOPIC_PREFIX};

/// Outcome of a versioned result write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Inputs unchanged since the snapshot; the topic is now processed
    Settled,
    /// Inputs grew during the run; result kept but the topic stays pending
    Stale,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sessions: u64,
    pub active_topics: u64,
    pub finished_topics: u64,
    pub pending_topics: u64,
    pub disk_usage_bytes: u64,
}

/// Topic storage interface.
pub struct TopicStore {
    storage: Arc<Storage>,
    write_lock: Mutex<()>,
}

fn require(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl TopicStore {
    /// Create a new store over shared storage.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Get underlying storage.
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_from(&self, cf_name: &str, session_id: &str, topic_id: &str) -> Result<Option<Topic>, StoreError> {
        let key = topic_key(session_id, topic_id);
        match self.storage.get(cf_name, key.as_bytes())? {
            Some(bytes) => Ok(Some(Topic::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_active(&self, topic: &Topic) -> Result<(), StoreError> {
        let key = topic_key(&topic.session_id, &topic.topic_id);
        self.storage.put(CF_TOPICS, key.as_bytes(), &topic.to_bytes()?)?;
        Ok(())
    }

    // --- Sessions ---

    /// Create a session. Creating an existing session is a no-op.
    #[instrument(skip(self))]
    pub fn create_session(&self, session_id: &str) -> Result<Session, StoreError> {
        require("session_id", session_id)?;
        let _guard = self.lock();

        let key = session_key(session_id);
        if let Some(bytes) = self.storage.get(CF_SESSIONS, key.as_bytes())? {
            debug!("Session already exists");
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let session = Session::new(session_id);
        self.storage
            .put(CF_SESSIONS, key.as_bytes(), &serde_json::to_vec(&session)?)?;
        info!("Created session");
        Ok(session)
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let key = session_key(session_id);
        match self.storage.get(CF_SESSIONS, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    // --- Topics ---

    /// Create an empty, pending topic inside an existing session.
    ///
    /// A topic id that only exists among finished topics starts a fresh
    /// active topic; the finished record is left untouched.
    #[instrument(skip(self))]
    pub fn create(&self, session_id: &str, topic_id: &str) -> Result<Topic, StoreError> {
        require("session_id", session_id)?;
        require("topic_id", topic_id)?;
        let _guard = self.lock();

        if self.get_session(session_id)?.is_none() {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        if self.get_from(CF_TOPICS, session_id, topic_id)?.is_some() {
            return Err(StoreError::AlreadyExists(TopicKey::new(session_id, topic_id)));
        }

        let topic = Topic::new(session_id, topic_id);
        self.save_active(&topic)?;
        info!("Created topic");
        Ok(topic)
    }

    /// Append a snippet to an active topic. Returns the new input count.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn append(&self, session_id: &str, topic_id: &str, text: &str) -> Result<usize, StoreError> {
        require("text", text)?;
        let _guard = self.lock();

        let mut topic = self
            .get_from(CF_TOPICS, session_id, topic_id)?
            .ok_or_else(|| StoreError::TopicNotFound(TopicKey::new(session_id, topic_id)))?;

        topic.push_input(text);
        self.save_active(&topic)?;

        debug!(total_inputs = topic.input_count(), version = topic.version, "Appended input");
        Ok(topic.input_count())
    }

    /// Read a topic snapshot, checking active topics before finished ones.
    #[instrument(skip(self))]
    pub fn read(&self, session_id: &str, topic_id: &str) -> Result<Topic, StoreError> {
        if let Some(topic) = self.get_from(CF_TOPICS, session_id, topic_id)? {
            return Ok(topic);
        }
        self.get_from(CF_FINISHED_TOPICS, session_id, topic_id)?
            .ok_or_else(|| StoreError::TopicNotFound(TopicKey::new(session_id, topic_id)))
    }

    /// Write a categorization computed from the inputs at `version_at_start`.
    ///
    /// The result is always stored. The topic only becomes processed when no
    /// input was appended since the snapshot.
    #[instrument(skip(self, result, summaries))]
    pub fn write_result(
        &self,
        session_id: &str,
        topic_id: &str,
        result: Categories,
        summaries: Option<Summaries>,
        version_at_start: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let _guard = self.lock();

        let mut topic = self
            .get_from(CF_TOPICS, session_id, topic_id)?
            .ok_or_else(|| StoreError::TopicNotFound(TopicKey::new(session_id, topic_id)))?;

        let outcome = if topic.version == version_at_start {
            topic.processed = true;
            WriteOutcome::Settled
        } else {
            topic.processed = false;
            WriteOutcome::Stale
        };
        topic.result = Some(result);
        topic.summaries = summaries;
        topic.updated_at = Utc::now();
        self.save_active(&topic)?;

        debug!(
            ?outcome,
            version_at_start,
            current_version = topic.version,
            "Wrote categorization"
        );
        Ok(outcome)
    }

    /// Seal a topic, moving it to the finished column family.
    ///
    /// A sealed record is never replaced: once an id has been finished,
    /// finishing it again fails even if the id was re-created since.
    #[instrument(skip(self))]
    pub fn finish(&self, session_id: &str, topic_id: &str) -> Result<Topic, StoreError> {
        require("session_id", session_id)?;
        require("topic_id", topic_id)?;
        let _guard = self.lock();

        let key = TopicKey::new(session_id, topic_id);
        if self.get_from(CF_FINISHED_TOPICS, session_id, topic_id)?.is_some() {
            return Err(StoreError::AlreadyFinished(key));
        }
        let mut topic = self
            .get_from(CF_TOPICS, session_id, topic_id)?
            .ok_or(StoreError::TopicNotFound(key))?;

        topic.finished = true;
        topic.updated_at = Utc::now();

        let raw_key = topic_key(session_id, topic_id);
        self.storage.move_value(
            CF_TOPICS,
            CF_FINISHED_TOPICS,
            raw_key.as_bytes(),
            &topic.to_bytes()?,
        )?;

        info!(total_inputs = topic.input_count(), "Finished topic");
        Ok(topic)
    }

    /// List all active topics in key order.
    pub fn list_active(&self) -> Result<Vec<Topic>, StoreError> {
        self.storage
            .prefix_iterator(CF_TOPICS, TOPIC_PREFIX)?
            .into_iter()
            .map(|(_, value)| Topic::from_bytes(&value).map_err(StoreError::from))
            .collect()
    }

    /// List active topics that need a (re)categorization pass.
    pub fn list_pending(&self) -> Result<Vec<Topic>, StoreError> {
        Ok(self
            .list_active()?
            .into_iter()
            .filter(|t| !t.processed)
            .collect())
    }

    /// Mark every active topic as needing reprocessing. Returns the number changed.
    #[instrument(skip(self))]
    pub fn reset_processed(&self) -> Result<usize, StoreError> {
        let _guard = self.lock();

        let mut count = 0;
        for mut topic in self.list_active()? {
            if topic.processed {
                topic.processed = false;
                self.save_active(&topic)?;
                count += 1;
            }
        }

        info!(count, "Reset processed flags");
        Ok(count)
    }

    /// Aggregate counts for status reporting.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let storage_stats = self.storage.get_stats()?;
        let pending = self.list_pending()?.len() as u64;

        Ok(StoreStats {
            sessions: storage_stats.session_count,
            active_topics: storage_stats.topic_count,
            finished_topics: storage_stats.finished_topic_count,
            pending_topics: pending,
            disk_usage_bytes: storage_stats.disk_usage_bytes,
        })
    }
}
