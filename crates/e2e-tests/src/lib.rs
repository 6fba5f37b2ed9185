//! End-to-end test infrastructure for topic-clusters.
//!
//! Provides a shared TestHarness and a scripted clustering engine for tests
//! covering the full create -> append -> sweep -> drain pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clusters_engine::{ClusteringEngine, EngineError};
use clusters_scheduler::{
    JobRegistry, NoopForwarder, SweepReport, Sweeper, UpdateQueue,
};
use clusters_service::AppState;
use clusters_storage::{Storage, TopicStore};
use clusters_types::{Categories, Summaries};
use tokio_util::sync::CancellationToken;

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub store: Arc<TopicStore>,
    pub queue: Arc<UpdateQueue>,
    pub registry: Arc<JobRegistry>,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        let store = Arc::new(TopicStore::new(Arc::clone(&storage)));

        Self {
            _temp_dir: temp_dir,
            storage,
            store,
            queue: Arc::new(UpdateQueue::new()),
            registry: Arc::new(JobRegistry::new()),
        }
    }

    /// Sweeper over the harness store and queue, forwarding nowhere.
    pub fn sweeper(&self, engine: Arc<dyn ClusteringEngine>) -> Sweeper {
        Sweeper::new(
            Arc::clone(&self.store),
            engine,
            Arc::clone(&self.queue),
            Arc::new(NoopForwarder),
        )
    }

    /// Run one full sweep pass.
    pub async fn sweep(&self, engine: Arc<dyn ClusteringEngine>) -> SweepReport {
        self.sweeper(engine)
            .sweep_once(&CancellationToken::new())
            .await
            .expect("Sweep failed")
    }

    /// HTTP state sharing the harness store and queue.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
        )
    }

    /// Create a session and topic, then append `inputs` in order.
    pub fn seed_topic(&self, session_id: &str, topic_id: &str, inputs: &[&str]) {
        self.store
            .create_session(session_id)
            .expect("Failed to create session");
        self.store
            .create(session_id, topic_id)
            .expect("Failed to create topic");
        for text in inputs {
            self.store
                .append(session_id, topic_id, text)
                .expect("Failed to append input");
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a category mapping from string literals.
pub fn categories(entries: &[(&str, &[&str])]) -> Categories {
    entries
        .iter()
        .map(|(label, members)| {
            (
                label.to_string(),
                members.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

/// One append performed while the engine is mid-categorization.
struct Injection {
    store: Arc<TopicStore>,
    session_id: String,
    topic_id: String,
    text: String,
}

/// Clustering engine with a scripted answer.
///
/// Without a script every input lands under "All". Calls are counted, and an
/// optional one-shot injection appends to the store during `categorize` to
/// reproduce a concurrent write.
pub struct StubEngine {
    script: Option<Categories>,
    summaries: Option<Summaries>,
    calls: Mutex<Vec<Vec<String>>>,
    injection: Mutex<Option<Injection>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            script: None,
            summaries: None,
            calls: Mutex::new(Vec::new()),
            injection: Mutex::new(None),
        }
    }

    pub fn with_script(mut self, script: Categories) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_summaries(mut self, summaries: Summaries) -> Self {
        self.summaries = Some(summaries);
        self
    }

    /// Append `text` to the topic the first time `categorize` runs.
    pub fn with_injected_append(
        self,
        store: Arc<TopicStore>,
        session_id: &str,
        topic_id: &str,
        text: &str,
    ) -> Self {
        *self.injection.lock().unwrap() = Some(Injection {
            store,
            session_id: session_id.to_string(),
            topic_id: topic_id.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Inputs seen by each `categorize` call, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusteringEngine for StubEngine {
    async fn categorize(&self, inputs: &[String]) -> Result<Categories, EngineError> {
        self.calls.lock().unwrap().push(inputs.to_vec());

        if let Some(injection) = self.injection.lock().unwrap().take() {
            injection
                .store
                .append(&injection.session_id, &injection.topic_id, &injection.text)
                .expect("Injected append failed");
        }

        if inputs.is_empty() {
            return Ok(Categories::new());
        }
        Ok(match &self.script {
            Some(script) => script.clone(),
            None => {
                let mut all = Categories::new();
                all.insert("All".to_string(), inputs.to_vec());
                all
            }
        })
    }

    async fn summarize(&self, _categories: &Categories) -> Option<Summaries> {
        self.summaries.clone()
    }
}
