//! In-memory buffer of "topic changed" events.
//!
//! Producers push after a settled categorization; a reader takes everything
//! at once. Push and drain share one mutex, so an event is either returned
//! by exactly one drain or still queued for the next.

use std::sync::{Mutex, MutexGuard, PoisonError};

use clusters_types::UpdateEvent;
use tracing::debug;

#[derive(Default)]
pub struct UpdateQueue {
    events: Mutex<Vec<UpdateEvent>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UpdateEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: UpdateEvent) {
        let mut events = self.lock();
        events.push(event);
        debug!(queued = events.len(), "Queued update event");
    }

    /// Return every queued event in push order and leave the queue empty.
    pub fn drain_all(&self) -> Vec<UpdateEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusters_types::Topic;
    use std::sync::Arc;
    use std::thread;

    fn event(topic_id: &str) -> UpdateEvent {
        UpdateEvent::from_topic(&Topic::new("s1", topic_id))
    }

    #[test]
    fn test_drain_returns_in_push_order_and_clears() {
        let queue = UpdateQueue::new();
        queue.push(event("a"));
        queue.push(event("b"));
        assert_eq!(queue.len(), 2);

        let drained: Vec<String> = queue.drain_all().into_iter().map(|e| e.topic_id).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_concurrent_push_and_drain_loses_nothing() {
        let queue = Arc::new(UpdateQueue::new());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(event(&format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();

        let drainer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = 0;
                for _ in 0..100 {
                    seen += queue.drain_all().len();
                    thread::yield_now();
                }
                seen
            })
        };

        for handle in producers {
            handle.join().unwrap();
        }
        let drained_early = drainer.join().unwrap();
        let remaining = queue.drain_all().len();

        assert_eq!(drained_early + remaining, 200);
    }
}
