//! Cluster titling.
//!
//! A [`TitleResolver`] runs an ordered chain of [`TitleStrategy`] objects and
//! returns the first acceptable title. Every strategy call is bounded by a
//! timeout; a timeout, error or decline moves on to the next strategy. When
//! all decline, the configured default title is used.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clusters_embeddings::{Embedding, EmbeddingModel};
use clusters_types::LabelingConfig;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::keywords::{capitalize, keyword_title};
use crate::llm::LlmClient;

/// Titles longer than this are rejected
pub const MAX_TITLE_WORDS: usize = 4;

/// Broad topics matched by [`CandidateTopicStrategy`].
pub const CANDIDATE_TOPICS: &[&str] = &[
    "technology and innovation",
    "artificial intelligence and machine learning",
    "climate change and environment",
    "healthcare and medical research",
    "business and technology companies",
    "energy and sustainability",
    "space exploration and astronomy",
    "transportation and vehicles",
    "science and research",
    "government and politics",
    "education and learning",
    "finance and economics",
    "entertainment and media",
    "social issues and society",
    "sports and fitness",
    "food and nutrition",
    "travel and tourism",
    "real estate and housing",
    "cybersecurity and privacy",
    "telecommunications and networks",
    "manufacturing and industry",
    "agriculture and farming",
    "fashion and lifestyle",
    "history and culture",
    "law and legal issues",
    "philosophy and ethics",
    "psychology and human behavior",
    "virtual reality and augmented reality",
    "blockchain and cryptocurrencies",
    "robotics and automation",
    "quantum computing and physics",
    "nanotechnology and materials science",
    "oceanography and marine biology",
    "wildlife and conservation",
    "urban development and smart cities",
    "mental health and well-being",
];

/// One way of proposing a title for a cluster.
#[async_trait]
pub trait TitleStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Propose a title, or `None` to decline.
    async fn propose(&self, texts: &[String]) -> Result<Option<String>, EngineError>;
}

/// Normalize a proposed title; `None` if it is empty or too long.
///
/// Strips surrounding quotes and punctuation, drops a leading "Title:" and
/// capitalizes each word.
pub fn clean_title(raw: &str) -> Option<String> {
    let first_line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let without_prefix = first_line
        .strip_prefix("Title:")
        .or_else(|| first_line.strip_prefix("title:"))
        .unwrap_or(first_line);

    let words: Vec<String> = without_prefix
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() || words.len() > MAX_TITLE_WORDS {
        return None;
    }
    Some(words.join(" "))
}

/// Shorten "x y and z" to "X Y" when the part before " and " has two or more words.
pub fn shorten_topic(topic: &str) -> String {
    let mut topic = topic;
    if let Some((head, _)) = topic.split_once(" and ") {
        if head.split_whitespace().count() >= 2 {
            topic = head;
        }
    }
    topic
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Make `raw` unique among `taken` by appending " (n)", n = 1, 2, ...
pub fn unique_label<V>(raw: &str, taken: &BTreeMap<String, V>) -> String {
    if !taken.contains_key(raw) {
        return raw.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{} ({})", raw, counter);
        if !taken.contains_key(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Ask an LLM for a short title.
pub struct LlmTitleStrategy {
    client: Arc<dyn LlmClient>,
    max_samples: usize,
    max_sample_chars: usize,
}

impl LlmTitleStrategy {
    pub fn new(client: Arc<dyn LlmClient>, max_samples: usize, max_sample_chars: usize) -> Self {
        Self {
            client,
            max_samples,
            max_sample_chars,
        }
    }

    fn build_prompt(&self, texts: &[String]) -> String {
        let samples = texts
            .iter()
            .take(self.max_samples)
            .map(|t| {
                let truncated: String = t.chars().take(self.max_sample_chars).collect();
                format!("- {}", truncated)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Write a title of 2 to 4 words for the common theme of these notes.
Do not use articles. Respond with ONLY the title.

Notes:
{samples}"#
        )
    }
}

#[async_trait]
impl TitleStrategy for LlmTitleStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn propose(&self, texts: &[String]) -> Result<Option<String>, EngineError> {
        let response = self.client.complete(&self.build_prompt(texts)).await?;
        Ok(clean_title(&response))
    }
}

/// Match the cluster against a fixed list of broad topics by embedding similarity.
pub struct CandidateTopicStrategy {
    embedder: Arc<dyn EmbeddingModel>,
    candidates: Vec<String>,
    threshold: f32,
    candidate_embeddings: OnceCell<Vec<Embedding>>,
}

impl CandidateTopicStrategy {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, threshold: f32) -> Self {
        Self::with_candidates(
            embedder,
            CANDIDATE_TOPICS.iter().map(|s| s.to_string()).collect(),
            threshold,
        )
    }

    pub fn with_candidates(
        embedder: Arc<dyn EmbeddingModel>,
        candidates: Vec<String>,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            candidates,
            threshold,
            candidate_embeddings: OnceCell::new(),
        }
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EngineError> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_texts(&texts))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
            .map_err(EngineError::from)
    }
}

#[async_trait]
impl TitleStrategy for CandidateTopicStrategy {
    fn name(&self) -> &'static str {
        "candidate_topics"
    }

    async fn propose(&self, texts: &[String]) -> Result<Option<String>, EngineError> {
        if self.candidates.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .candidate_embeddings
            .get_or_try_init(|| self.embed_blocking(self.candidates.clone()))
            .await?;

        let combined = self.embed_blocking(vec![texts.join(" ")]).await?;
        let Some(cluster) = combined.first() else {
            return Ok(None);
        };

        let best = candidates
            .iter()
            .zip(self.candidates.iter())
            .map(|(emb, label)| (cluster.cosine_similarity(emb), label))
            .fold(None, |best: Option<(f32, &String)>, (score, label)| match best {
                Some((s, _)) if s >= score => best,
                _ => Some((score, label)),
            });

        match best {
            Some((score, label)) if score > self.threshold => {
                debug!(score, label = %label, "Candidate topic matched");
                Ok(Some(shorten_topic(label)))
            }
            _ => Ok(None),
        }
    }
}

/// Most frequent keywords across the cluster.
pub struct KeywordTitleStrategy;

#[async_trait]
impl TitleStrategy for KeywordTitleStrategy {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn propose(&self, texts: &[String]) -> Result<Option<String>, EngineError> {
        Ok(keyword_title(texts))
    }
}

/// Ordered strategy chain with a default title.
pub struct TitleResolver {
    strategies: Vec<Box<dyn TitleStrategy>>,
    timeout: Duration,
    default_title: String,
}

impl TitleResolver {
    pub fn new(
        strategies: Vec<Box<dyn TitleStrategy>>,
        timeout: Duration,
        default_title: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            timeout,
            default_title: default_title.into(),
        }
    }

    /// Build the standard chain: LLM (when available and enabled), candidate
    /// topics (when enabled), then keywords.
    pub fn from_config(
        config: &LabelingConfig,
        llm: Option<Arc<dyn LlmClient>>,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn TitleStrategy>> = Vec::new();
        if let (true, Some(client)) = (config.use_llm, llm) {
            strategies.push(Box::new(LlmTitleStrategy::new(
                client,
                config.max_samples,
                config.max_sample_chars,
            )));
        }
        if config.use_candidates {
            strategies.push(Box::new(CandidateTopicStrategy::new(
                embedder,
                config.candidate_threshold,
            )));
        }
        strategies.push(Box::new(KeywordTitleStrategy));

        Self::new(
            strategies,
            Duration::from_millis(config.timeout_ms),
            config.default_title.clone(),
        )
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Title for one cluster; never empty.
    pub async fn title(&self, texts: &[String]) -> String {
        for strategy in &self.strategies {
            match tokio::time::timeout(self.timeout, strategy.propose(texts)).await {
                Ok(Ok(Some(raw))) => {
                    if let Some(title) = clean_title(&raw) {
                        debug!(strategy = strategy.name(), title = %title, "Title resolved");
                        return title;
                    }
                    debug!(strategy = strategy.name(), raw = %raw, "Title rejected");
                }
                Ok(Ok(None)) => {
                    debug!(strategy = strategy.name(), "Strategy declined");
                }
                Ok(Err(e)) => {
                    warn!(strategy = strategy.name(), error = %e, "Title strategy failed, falling back");
                }
                Err(_) => {
                    warn!(
                        strategy = strategy.name(),
                        timeout_ms = self.timeout.as_millis(),
                        "Title strategy timed out, falling back"
                    );
                }
            }
        }
        self.default_title.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusters_embeddings::HashingEmbedder;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
            Ok(self.0.to_string())
        }
    }

    struct SlowLlm;

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("Too Late".to_string())
        }
    }

    struct CapturingLlm(std::sync::Mutex<String>);

    #[async_trait]
    impl LlmClient for CapturingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
            *self.0.lock().unwrap() = prompt.to_string();
            Ok("Captured".to_string())
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn llm_resolver(client: Arc<dyn LlmClient>, timeout: Duration) -> TitleResolver {
        TitleResolver::new(
            vec![
                Box::new(LlmTitleStrategy::new(client, 5, 200)),
                Box::new(KeywordTitleStrategy),
            ],
            timeout,
            "General Topics",
        )
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("\"machine learning\"."), Some("Machine Learning".to_string()));
        assert_eq!(clean_title("Title: solar power"), Some("Solar Power".to_string()));
        assert_eq!(clean_title("   "), None);
        assert_eq!(clean_title("one two three four five"), None);
    }

    #[test]
    fn test_shorten_topic() {
        assert_eq!(
            shorten_topic("artificial intelligence and machine learning"),
            "Artificial Intelligence"
        );
        assert_eq!(shorten_topic("sports and fitness"), "Sports And Fitness");
        assert_eq!(shorten_topic("science and research"), "Science And Research");
    }

    #[test]
    fn test_unique_label() {
        let mut taken: BTreeMap<String, ()> = BTreeMap::new();
        assert_eq!(unique_label("X", &taken), "X");
        taken.insert("X".to_string(), ());
        assert_eq!(unique_label("X", &taken), "X (1)");
        taken.insert("X (1)".to_string(), ());
        assert_eq!(unique_label("X", &taken), "X (2)");
    }

    #[tokio::test]
    async fn test_llm_title_wins() {
        let resolver = llm_resolver(Arc::new(FixedLlm("Solar Energy")), Duration::from_secs(1));
        let title = resolver.title(&texts(&["solar panels on roofs"])).await;
        assert_eq!(title, "Solar Energy");
    }

    #[tokio::test]
    async fn test_long_llm_title_falls_back_to_keywords() {
        let resolver = llm_resolver(
            Arc::new(FixedLlm("A very long and rambling title")),
            Duration::from_secs(1),
        );
        let title = resolver.title(&texts(&["batteries batteries storage"])).await;
        assert_eq!(title, "Batteries Storage");
    }

    #[tokio::test]
    async fn test_failing_llm_falls_back() {
        let resolver = llm_resolver(Arc::new(crate::llm::NoOpLlmClient), Duration::from_secs(1));
        let title = resolver.title(&texts(&["gardening tomatoes"])).await;
        assert_eq!(title, "Gardening Tomatoes");
    }

    #[tokio::test]
    async fn test_fallback_title_is_stable_on_ties() {
        // Every keyword appears twice; first occurrence decides the order
        let inputs = texts(&["zebra apple mango", "mango apple zebra"]);
        let resolver = llm_resolver(Arc::new(crate::llm::NoOpLlmClient), Duration::from_secs(1));

        for _ in 0..20 {
            assert_eq!(resolver.title(&inputs).await, "Zebra Apple");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let resolver = llm_resolver(Arc::new(SlowLlm), Duration::from_millis(50));
        let title = resolver.title(&texts(&["volcano eruptions"])).await;
        assert_eq!(title, "Volcano Eruptions");
    }

    #[tokio::test]
    async fn test_default_when_all_decline() {
        let resolver = TitleResolver::new(
            vec![Box::new(KeywordTitleStrategy)],
            Duration::from_secs(1),
            "General Topics",
        );
        assert_eq!(resolver.title(&texts(&["a b c", "it is"])).await, "General Topics");
    }

    #[tokio::test]
    async fn test_prompt_limits_samples() {
        let client = Arc::new(CapturingLlm(std::sync::Mutex::new(String::new())));
        let strategy = LlmTitleStrategy::new(client.clone(), 2, 5);
        strategy
            .propose(&texts(&["abcdefghij", "second", "third"]))
            .await
            .unwrap();

        let prompt = client.0.lock().unwrap().clone();
        assert!(prompt.contains("- abcde\n"));
        assert!(!prompt.contains("abcdef"));
        assert!(prompt.contains("- secon"));
        assert!(!prompt.contains("third"));
    }

    #[tokio::test]
    async fn test_candidate_strategy_matches_close_topic() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new(256).unwrap());
        let strategy = CandidateTopicStrategy::with_candidates(
            embedder,
            vec![
                "sports and fitness".to_string(),
                "food and nutrition".to_string(),
            ],
            0.3,
        );

        let title = strategy
            .propose(&texts(&["food nutrition", "nutrition food"]))
            .await
            .unwrap();
        assert_eq!(title, Some("Food And Nutrition".to_string()));

        let none = strategy
            .propose(&texts(&["quantum chromodynamics"]))
            .await
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_from_config_chain() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new(32).unwrap());
        let config = LabelingConfig::default();

        let without_llm = TitleResolver::from_config(&config, None, embedder.clone());
        assert_eq!(without_llm.strategy_names(), vec!["candidate_topics", "keywords"]);

        let with_llm = TitleResolver::from_config(
            &config,
            Some(Arc::new(FixedLlm("x")) as Arc<dyn LlmClient>),
            embedder,
        );
        assert_eq!(
            with_llm.strategy_names(),
            vec!["llm", "candidate_topics", "keywords"]
        );
    }
}
