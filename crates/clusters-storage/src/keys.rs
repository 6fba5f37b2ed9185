//! Key encoding for storage layer.
//!
//! Key formats:
//! - sessions: `session:{session_id}`
//! - topics / finished_topics: `topic:{session_len}:{session_id}:{topic_id}`
//!
//! Ids are opaque and may contain `:`; the byte length of the session id
//! keeps topic keys unambiguous. Values carry the full identifiers, so keys
//! are never parsed back.

/// Prefix shared by every topic key
pub const TOPIC_PREFIX: &[u8] = b"topic:";

/// Prefix shared by every session key
pub const SESSION_PREFIX: &[u8] = b"session:";

/// Key format for sessions: session:{session_id}
pub fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

/// Key format for topics: topic:{session_len}:{session_id}:{topic_id}
pub fn topic_key(session_id: &str, topic_id: &str) -> String {
    format!("topic:{}:{}:{}", session_id.len(), session_id, topic_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("abc"), "session:abc");
        assert!(session_key("abc").as_bytes().starts_with(SESSION_PREFIX));
    }

    #[test]
    fn test_topic_key_format() {
        assert_eq!(topic_key("s1", "notes"), "topic:2:s1:notes");
        assert!(topic_key("s1", "notes").as_bytes().starts_with(TOPIC_PREFIX));
    }

    #[test]
    fn test_topic_key_separates_colon_ids() {
        assert_ne!(topic_key("a:b", "c"), topic_key("a", "b:c"));
        assert_ne!(topic_key("a", ":b"), topic_key("a:", "b"));
        assert_eq!(topic_key("a:b", "c"), "topic:3:a:b:c");
        assert_eq!(topic_key("a", "b:c"), "topic:1:a:b:c");
    }
}
