//! The clustering engine: embed, partition, title.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clusters_embeddings::EmbeddingModel;
use clusters_types::{Categories, EngineConfig, Settings, Summaries};
use tracing::{debug, info, instrument};

use crate::error::EngineError;
use crate::kmeans::KMeans;
use crate::llm::{ApiLlmClient, ApiLlmConfig, LlmClient};
use crate::summary::CategorySummarizer;
use crate::title::{unique_label, TitleResolver};

/// Maps a list of snippets to labeled clusters.
#[async_trait]
pub trait ClusteringEngine: Send + Sync {
    /// Partition `inputs` into labeled categories.
    ///
    /// Every input lands in exactly one category, members keep input order,
    /// and labels are unique. Empty input yields an empty mapping.
    async fn categorize(&self, inputs: &[String]) -> Result<Categories, EngineError>;

    /// Optional one-sentence summary per category.
    async fn summarize(&self, _categories: &Categories) -> Option<Summaries> {
        None
    }
}

/// Build the LLM client described by settings, if any.
pub fn llm_from_settings(settings: &Settings) -> Result<Option<Arc<dyn LlmClient>>, EngineError> {
    match ApiLlmConfig::from_settings(&settings.llm) {
        Some(config) => {
            info!(model = %config.model, base_url = %config.base_url, "LLM client configured");
            Ok(Some(Arc::new(ApiLlmClient::new(config)?)))
        }
        None => {
            debug!("No LLM API key configured");
            Ok(None)
        }
    }
}

/// Embedding + k-means + strategy-chain titles.
pub struct EmbeddingClusteringEngine {
    embedder: Arc<dyn EmbeddingModel>,
    resolver: TitleResolver,
    summarizer: Option<CategorySummarizer>,
    config: EngineConfig,
}

impl EmbeddingClusteringEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        resolver: TitleResolver,
        summarizer: Option<CategorySummarizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            embedder,
            resolver,
            summarizer,
            config,
        }
    }

    /// Wire the engine from config, an embedder and an optional LLM client.
    pub fn from_config(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingModel>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let resolver =
            TitleResolver::from_config(&config.labeling, llm.clone(), Arc::clone(&embedder));
        let summarizer = config.summaries.enabled.then(|| {
            CategorySummarizer::new(llm, Duration::from_millis(config.labeling.timeout_ms))
        });
        Self::new(embedder, resolver, summarizer, config)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let embedder = Arc::clone(&self.embedder);
        let texts = inputs.to_vec();
        let timeout = Duration::from_secs(self.config.embed_timeout_secs);

        let task = tokio::task::spawn_blocking(move || embedder.embed_texts(&texts));
        let embeddings = tokio::time::timeout(timeout, task)
            .await
            .map_err(|_| EngineError::EmbeddingTimeout(timeout))?
            .map_err(|e| EngineError::Task(e.to_string()))??;

        Ok(embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl ClusteringEngine for EmbeddingClusteringEngine {
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    async fn categorize(&self, inputs: &[String]) -> Result<Categories, EngineError> {
        let mut results = Categories::new();
        if inputs.is_empty() {
            return Ok(results);
        }

        let vectors = self.embed(inputs).await?;

        let k = self.config.cluster_count.cluster_count(inputs.len());
        let assignments = KMeans::new(k)?
            .with_seed(self.config.seed)
            .with_max_iterations(self.config.max_iterations)
            .fit_predict(&vectors)?;

        for cluster_id in 0..k {
            let members: Vec<String> = inputs
                .iter()
                .zip(assignments.iter())
                .filter(|&(_, &assigned)| assigned == cluster_id)
                .map(|(text, _)| text.clone())
                .collect();

            if members.is_empty() {
                continue;
            }

            let title = self.resolver.title(&members).await;
            let label = unique_label(&title, &results);
            results.insert(label, members);
        }

        debug!(k, categories = results.len(), "Categorized inputs");
        Ok(results)
    }

    async fn summarize(&self, categories: &Categories) -> Option<Summaries> {
        match &self.summarizer {
            Some(summarizer) => Some(summarizer.summarize_all(categories).await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::TitleStrategy;
    use clusters_embeddings::{Embedding, EmbeddingError, HashingEmbedder, ModelInfo};
    use clusters_types::LabelingConfig;

    fn engine(summaries: bool) -> EmbeddingClusteringEngine {
        let mut config = EngineConfig {
            labeling: LabelingConfig {
                use_llm: false,
                use_candidates: false,
                ..Default::default()
            },
            ..Default::default()
        };
        config.summaries.enabled = summaries;
        EmbeddingClusteringEngine::from_config(
            config,
            Arc::new(HashingEmbedder::new(256).unwrap()),
            None,
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let result = engine(false).categorize(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_single_input() {
        let result = engine(false)
            .categorize(&strings(&["volcanoes erupting lava"]))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.values().next().unwrap(),
            &strings(&["volcanoes erupting lava"])
        );
    }

    #[tokio::test]
    async fn test_partitions_inputs_exactly() {
        let inputs = strings(&[
            "python pandas dataframes",
            "baking sourdough bread",
            "python numpy arrays",
            "sourdough starter feeding",
            "python matplotlib charts",
            "bread flour hydration",
            "python pandas numpy",
        ]);
        let result = engine(false).categorize(&inputs).await.unwrap();

        // k = max(2, 7 / 3) = 2, so at most two labels
        assert!(!result.is_empty() && result.len() <= 2);

        let mut members: Vec<String> = result.values().flatten().cloned().collect();
        let mut expected = inputs.clone();
        members.sort();
        expected.sort();
        assert_eq!(members, expected);

        // Members keep input order inside each label
        for group in result.values() {
            let positions: Vec<usize> = group
                .iter()
                .map(|m| inputs.iter().position(|i| i == m).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[tokio::test]
    async fn test_duplicate_inputs_kept_positionally() {
        let inputs = strings(&["same words here", "same words here", "same words here"]);
        let result = engine(false).categorize(&inputs).await.unwrap();
        let total: usize = result.values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    /// Maps texts starting with "north" to one axis and everything else to another.
    struct AxisEmbedder {
        info: ModelInfo,
    }

    impl EmbeddingModel for AxisEmbedder {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            let values = if text.starts_with("north") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            };
            Ok(Embedding::new(values))
        }
    }

    struct SameTitle;

    #[async_trait]
    impl TitleStrategy for SameTitle {
        fn name(&self) -> &'static str {
            "same"
        }

        async fn propose(&self, _texts: &[String]) -> Result<Option<String>, EngineError> {
            Ok(Some("X".to_string()))
        }
    }

    #[tokio::test]
    async fn test_colliding_titles_get_suffixes() {
        let engine = EmbeddingClusteringEngine::new(
            Arc::new(AxisEmbedder {
                info: ModelInfo {
                    name: "axis".to_string(),
                    dimension: 2,
                    max_sequence_length: 0,
                },
            }),
            TitleResolver::new(vec![Box::new(SameTitle)], Duration::from_secs(1), "General Topics"),
            None,
            EngineConfig::default(),
        );

        let inputs = strings(&["north one", "south one", "north two", "south two"]);
        let result = engine.categorize(&inputs).await.unwrap();

        let labels: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["X", "X (1)"]);

        let mut groups: Vec<Vec<String>> = result.into_values().collect();
        groups.sort();
        assert_eq!(
            groups,
            vec![
                strings(&["north one", "north two"]),
                strings(&["south one", "south two"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_summaries_follow_config() {
        let inputs = strings(&["solar panels", "solar batteries"]);

        let plain = engine(false);
        let categories = plain.categorize(&inputs).await.unwrap();
        assert!(plain.summarize(&categories).await.is_none());

        let summarizing = engine(true);
        let categories = summarizing.categorize(&inputs).await.unwrap();
        let summaries = summarizing.summarize(&categories).await.unwrap();
        assert_eq!(summaries.len(), categories.len());
    }

    #[test]
    fn test_llm_from_settings_without_key() {
        let settings = Settings::default();
        assert!(llm_from_settings(&settings).unwrap().is_none());
    }
}
