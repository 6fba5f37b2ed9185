//! The reprocessing sweep.
//!
//! One pass walks every active topic. Settled and empty topics are skipped;
//! the rest are categorized from an `(inputs, version)` snapshot and written
//! back through the store's version compare. Only a settled write produces
//! an update event and a downstream delivery.

use std::sync::Arc;

use clusters_engine::ClusteringEngine;
use clusters_storage::{TopicStore, WriteOutcome};
use clusters_types::{Topic, UpdateEvent};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::forward::Forwarder;
use crate::registry::JobOutput;
use crate::updates::UpdateQueue;
use crate::SchedulerError;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Topics handed to the engine
    pub processed: usize,
    pub settled: usize,
    /// Inputs grew while categorizing; retried next pass
    pub stale: usize,
    pub skipped_empty: usize,
    pub skipped_settled: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn to_job_output(&self) -> JobOutput {
        JobOutput::new()
            .with_metadata("scanned", self.scanned)
            .with_metadata("processed", self.processed)
            .with_metadata("settled", self.settled)
            .with_metadata("stale", self.stale)
            .with_metadata("skipped_empty", self.skipped_empty)
            .with_metadata("skipped_settled", self.skipped_settled)
            .with_metadata("failed", self.failed)
    }
}

/// What happened to one topic during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    SkippedEmpty,
    SkippedSettled,
    Settled,
    Stale,
    Failed,
}

/// Runs sweep passes over the store.
pub struct Sweeper {
    store: Arc<TopicStore>,
    engine: Arc<dyn ClusteringEngine>,
    queue: Arc<UpdateQueue>,
    forwarder: Arc<dyn Forwarder>,
}

impl Sweeper {
    pub fn new(
        store: Arc<TopicStore>,
        engine: Arc<dyn ClusteringEngine>,
        queue: Arc<UpdateQueue>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            store,
            engine,
            queue,
            forwarder,
        }
    }

    /// One pass over all active topics.
    ///
    /// Stops early, with a partial report, once `cancel` fires. Failures on
    /// a single topic are logged and counted; only a failure to list topics
    /// aborts the pass.
    #[instrument(skip_all)]
    pub async fn sweep_once(&self, cancel: &CancellationToken) -> Result<SweepReport, SchedulerError> {
        let topics = self.store.list_active()?;
        let mut report = SweepReport::default();

        for topic in topics {
            if cancel.is_cancelled() {
                info!(scanned = report.scanned, "Sweep cancelled");
                break;
            }

            report.scanned += 1;
            match self.process_topic(topic).await {
                TopicOutcome::SkippedEmpty => report.skipped_empty += 1,
                TopicOutcome::SkippedSettled => report.skipped_settled += 1,
                TopicOutcome::Settled => {
                    report.processed += 1;
                    report.settled += 1;
                }
                TopicOutcome::Stale => {
                    report.processed += 1;
                    report.stale += 1;
                }
                TopicOutcome::Failed => report.failed += 1,
            }
        }

        if report.processed > 0 || report.failed > 0 {
            info!(?report, "Sweep complete");
        } else {
            debug!(scanned = report.scanned, "Sweep found nothing to do");
        }
        Ok(report)
    }

    /// Categorize one topic snapshot and write the result back.
    #[instrument(skip_all, fields(session_id = %topic.session_id, topic_id = %topic.topic_id))]
    pub async fn process_topic(&self, topic: Topic) -> TopicOutcome {
        if topic.inputs.is_empty() {
            return TopicOutcome::SkippedEmpty;
        }
        if topic.processed {
            return TopicOutcome::SkippedSettled;
        }

        let version_at_start = topic.version;
        let categories = match self.engine.categorize(&topic.inputs).await {
            Ok(categories) => categories,
            Err(e) => {
                warn!(code = %e.code(), error = %e, "Categorization failed, topic stays pending");
                return TopicOutcome::Failed;
            }
        };
        let summaries = self.engine.summarize(&categories).await;

        let outcome = match self.store.write_result(
            &topic.session_id,
            &topic.topic_id,
            categories.clone(),
            summaries.clone(),
            version_at_start,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(code = %e.code(), error = %e, "Could not write result");
                return TopicOutcome::Failed;
            }
        };

        match outcome {
            WriteOutcome::Settled => {
                // Publish the snapshot that was categorized, not a re-read
                // that may already hold newer inputs
                let mut settled = topic;
                settled.result = Some(categories);
                settled.summaries = summaries;
                settled.processed = true;
                self.publish(&settled).await;
                TopicOutcome::Settled
            }
            WriteOutcome::Stale => {
                debug!(version_at_start, "Inputs grew during categorization");
                TopicOutcome::Stale
            }
        }
    }

    async fn publish(&self, settled: &Topic) {
        self.queue.push(UpdateEvent::from_topic(settled));

        if let Err(e) = self.forwarder.forward(settled).await {
            warn!(code = %e.code(), error = %e, "Downstream delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::NoopForwarder;
    use async_trait::async_trait;
    use clusters_engine::EngineError;
    use clusters_storage::Storage;
    use clusters_types::Categories;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Puts every input under one label and records each call.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl ClusteringEngine for RecordingEngine {
        async fn categorize(&self, inputs: &[String]) -> Result<Categories, EngineError> {
            self.calls.lock().unwrap().push(inputs.to_vec());
            if self.fail {
                return Err(EngineError::Clustering("backend down".to_string()));
            }
            let mut result = Categories::new();
            result.insert("All".to_string(), inputs.to_vec());
            Ok(result)
        }
    }

    struct CountingForwarder(AtomicUsize);

    #[async_trait]
    impl Forwarder for CountingForwarder {
        async fn forward(&self, _topic: &Topic) -> Result<(), SchedulerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(SchedulerError::Delivery("unreachable".to_string()))
        }
    }

    /// Keeps every topic it is asked to forward.
    #[derive(Default)]
    struct CapturingForwarder(Mutex<Vec<Topic>>);

    #[async_trait]
    impl Forwarder for CapturingForwarder {
        async fn forward(&self, topic: &Topic) -> Result<(), SchedulerError> {
            self.0.lock().unwrap().push(topic.clone());
            Ok(())
        }
    }

    fn store() -> (Arc<TopicStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        (Arc::new(TopicStore::new(storage)), temp_dir)
    }

    fn sweeper(
        store: &Arc<TopicStore>,
        engine: &Arc<RecordingEngine>,
        queue: &Arc<UpdateQueue>,
    ) -> Sweeper {
        Sweeper::new(
            Arc::clone(store),
            Arc::clone(engine) as Arc<dyn ClusteringEngine>,
            Arc::clone(queue),
            Arc::new(NoopForwarder),
        )
    }

    #[tokio::test]
    async fn test_sweep_settles_and_queues_event() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "first").unwrap();
        store.append("s1", "t1", "second").unwrap();

        let engine = Arc::new(RecordingEngine::default());
        let queue = Arc::new(UpdateQueue::new());
        let sweeper = sweeper(&store, &engine, &queue);

        let report = sweeper.sweep_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.settled, 1);

        let topic = store.read("s1", "t1").unwrap();
        assert!(topic.processed);
        assert_eq!(
            topic.result.unwrap().get("All").unwrap(),
            &vec!["first".to_string(), "second".to_string()]
        );

        let events = queue.drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic_id, "t1");
    }

    #[tokio::test]
    async fn test_empty_topics_never_reach_engine() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "empty").unwrap();

        let engine = Arc::new(RecordingEngine::default());
        let queue = Arc::new(UpdateQueue::new());
        let report = sweeper(&store, &engine, &queue)
            .sweep_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.skipped_empty, 1);
        assert!(engine.calls.lock().unwrap().is_empty());
        assert!(!store.read("s1", "empty").unwrap().processed);
    }

    #[tokio::test]
    async fn test_second_sweep_is_noop() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "only").unwrap();

        let engine = Arc::new(RecordingEngine::default());
        let queue = Arc::new(UpdateQueue::new());
        let sweeper = sweeper(&store, &engine, &queue);
        let cancel = CancellationToken::new();

        sweeper.sweep_once(&cancel).await.unwrap();
        let before = store.read("s1", "t1").unwrap();
        queue.drain_all();

        let report = sweeper.sweep_once(&cancel).await.unwrap();
        assert_eq!(report.skipped_settled, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
        assert!(queue.is_empty());

        let after = store.read("s1", "t1").unwrap();
        assert_eq!(before.result, after.result);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_topic_pending() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "text").unwrap();

        let engine = Arc::new(RecordingEngine {
            fail: true,
            ..Default::default()
        });
        let queue = Arc::new(UpdateQueue::new());
        let report = sweeper(&store, &engine, &queue)
            .sweep_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let topic = store.read("s1", "t1").unwrap();
        assert!(!topic.processed);
        assert!(topic.result.is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_undo_settle() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "text").unwrap();

        let forwarder = Arc::new(CountingForwarder(AtomicUsize::new(0)));
        let queue = Arc::new(UpdateQueue::new());
        let sweeper = Sweeper::new(
            Arc::clone(&store),
            Arc::new(RecordingEngine::default()),
            Arc::clone(&queue),
            Arc::clone(&forwarder) as Arc<dyn Forwarder>,
        );

        let report = sweeper.sweep_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.settled, 1);
        assert_eq!(forwarder.0.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
        assert!(store.read("s1", "t1").unwrap().processed);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_stops_early() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        for id in ["a", "b"] {
            store.create("s1", id).unwrap();
            store.append("s1", id, "text").unwrap();
        }

        let engine = Arc::new(RecordingEngine::default());
        let queue = Arc::new(UpdateQueue::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = sweeper(&store, &engine, &queue)
            .sweep_once(&cancel)
            .await
            .unwrap();
        assert_eq!(report.scanned, 0);
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_published_snapshot_matches_categorized_inputs() {
        let (store, _dir) = store();
        store.create_session("s1").unwrap();
        store.create("s1", "t1").unwrap();
        store.append("s1", "t1", "first").unwrap();
        store.append("s1", "t1", "second").unwrap();
        let snapshot = store.read("s1", "t1").unwrap();

        let engine = Arc::new(RecordingEngine::default());
        let queue = Arc::new(UpdateQueue::new());
        let forwarder = Arc::new(CapturingForwarder::default());
        let sweeper = Sweeper::new(
            Arc::clone(&store),
            engine as Arc<dyn ClusteringEngine>,
            Arc::clone(&queue),
            Arc::clone(&forwarder) as Arc<dyn Forwarder>,
        );

        assert_eq!(sweeper.process_topic(snapshot).await, TopicOutcome::Settled);

        store.append("s1", "t1", "third").unwrap();

        let forwarded = forwarder.0.lock().unwrap().clone();
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded[0].processed);
        assert_eq!(forwarded[0].version, 2);
        assert_eq!(forwarded[0].inputs, vec!["first", "second"]);
        assert_eq!(
            forwarded[0].result.as_ref().unwrap()["All"],
            vec!["first", "second"]
        );

        let events = queue.drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.formatted["All"], vec!["first", "second"]);
    }

    #[test]
    fn test_report_to_job_output() {
        let report = SweepReport {
            scanned: 3,
            settled: 2,
            ..Default::default()
        };
        let output = report.to_job_output();
        assert_eq!(output.metadata.get("scanned").map(String::as_str), Some("3"));
        assert_eq!(output.metadata.get("settled").map(String::as_str), Some("2"));
    }
}
