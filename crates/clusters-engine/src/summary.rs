//! One-sentence summaries per category.
//!
//! The LLM is asked first; its answer is kept only if it is longer than 15
//! characters and does not merely repeat the start of the input. Otherwise a
//! template sentence is built from the category's key concepts.

use std::sync::Arc;
use std::time::Duration;

use clusters_types::{Categories, Summaries};
use tracing::{debug, warn};

use crate::keywords::key_concepts;
use crate::llm::LlmClient;

const MIN_SUMMARY_CHARS: usize = 15;
const PROMPT_INPUT_CHARS: usize = 400;
const MAX_CONCEPTS: usize = 5;

/// Template summary from key concepts.
pub fn template_summary(texts: &[String], concepts: &[String]) -> String {
    let num = texts.len();
    match concepts {
        [] => format!("Collection of {} related entries.", num),
        [first, ..] if num == 1 => format!("Focuses on {}.", first),
        [a, b, c, ..] => format!("Covers {}, {}, and {} across {} entries.", a, b, c, num),
        [a, b] => format!("Discusses {} and {} in {} entries.", a, b, num),
        [a] => format!("Explores {} through {} different perspectives.", a, num),
    }
}

/// Summarizes categories with an optional LLM.
pub struct CategorySummarizer {
    llm: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl CategorySummarizer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    fn build_prompt(combined: &str, concepts: &[String]) -> String {
        let excerpt: String = combined.chars().take(PROMPT_INPUT_CHARS).collect();
        if concepts.len() < 2 {
            format!("Summarize in one sentence: {}", excerpt)
        } else {
            let focus = concepts.iter().take(4).cloned().collect::<Vec<_>>().join(", ");
            format!(
                "Write a one-sentence summary about {} based on: {}",
                focus, excerpt
            )
        }
    }

    fn accept(candidate: &str, combined: &str) -> Option<String> {
        let candidate = candidate.trim();
        if candidate.chars().count() <= MIN_SUMMARY_CHARS {
            return None;
        }
        if combined.to_lowercase().starts_with(&candidate.to_lowercase()) {
            return None;
        }
        Some(candidate.to_string())
    }

    /// Summary for one category.
    pub async fn summarize(&self, texts: &[String]) -> String {
        let combined = texts.join(" ");
        let concepts = key_concepts(texts, MAX_CONCEPTS);

        if let Some(llm) = &self.llm {
            let prompt = Self::build_prompt(&combined, &concepts);
            match tokio::time::timeout(self.timeout, llm.complete(&prompt)).await {
                Ok(Ok(response)) => {
                    if let Some(summary) = Self::accept(&response, &combined) {
                        return summary;
                    }
                    debug!("LLM summary rejected, using template");
                }
                Ok(Err(e)) => warn!(error = %e, "LLM summary failed, using template"),
                Err(_) => warn!("LLM summary timed out, using template"),
            }
        }

        template_summary(texts, &concepts)
    }

    /// Summaries for every non-empty category.
    pub async fn summarize_all(&self, categories: &Categories) -> Summaries {
        let mut summaries = Summaries::new();
        for (label, texts) in categories {
            if texts.is_empty() {
                continue;
            }
            summaries.insert(label.clone(), self.summarize(texts).await);
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use async_trait::async_trait;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
            Ok(self.0.to_string())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_template_variants() {
        let three = strings(&["alpha", "beta", "gamma"]);
        assert_eq!(
            template_summary(&strings(&["x", "y"]), &strings(&["solar", "wind", "hydro"])),
            "Covers solar, wind, and hydro across 2 entries."
        );
        assert_eq!(
            template_summary(&three, &strings(&["solar", "wind"])),
            "Discusses solar and wind in 3 entries."
        );
        assert_eq!(
            template_summary(&strings(&["x"]), &strings(&["solar", "wind"])),
            "Focuses on solar."
        );
        assert_eq!(
            template_summary(&three, &strings(&["solar"])),
            "Explores solar through 3 different perspectives."
        );
        assert_eq!(
            template_summary(&three, &[]),
            "Collection of 3 related entries."
        );
    }

    #[tokio::test]
    async fn test_without_llm_uses_template() {
        let summarizer = CategorySummarizer::new(None, Duration::from_secs(1));
        let summary = summarizer
            .summarize(&strings(&["solar panels", "solar batteries"]))
            .await;
        assert_eq!(summary, "Covers solar, panels, and batteries across 2 entries.");
    }

    #[tokio::test]
    async fn test_llm_summary_accepted() {
        let summarizer = CategorySummarizer::new(
            Some(Arc::new(FixedLlm("Notes about renewable home energy."))),
            Duration::from_secs(1),
        );
        let summary = summarizer.summarize(&strings(&["solar panels"])).await;
        assert_eq!(summary, "Notes about renewable home energy.");
    }

    #[tokio::test]
    async fn test_echoing_llm_summary_rejected() {
        let summarizer = CategorySummarizer::new(
            Some(Arc::new(FixedLlm("Solar panels on the roof"))),
            Duration::from_secs(1),
        );
        let summary = summarizer
            .summarize(&strings(&["solar panels on the roof of the house"]))
            .await;
        assert_eq!(summary, "Focuses on solar.");
    }

    #[tokio::test]
    async fn test_short_llm_summary_rejected() {
        let summarizer = CategorySummarizer::new(
            Some(Arc::new(FixedLlm("Solar."))),
            Duration::from_secs(1),
        );
        let summary = summarizer.summarize(&strings(&["solar panels"])).await;
        assert_eq!(summary, "Focuses on solar.");
    }

    #[tokio::test]
    async fn test_summarize_all_skips_empty() {
        let summarizer = CategorySummarizer::new(None, Duration::from_secs(1));
        let mut categories = Categories::new();
        categories.insert("Energy".to_string(), strings(&["solar panels"]));
        categories.insert("Empty".to_string(), vec![]);

        let summaries = summarizer.summarize_all(&categories).await;
        assert_eq!(summaries.len(), 1);
        assert!(summaries.contains_key("Energy"));
    }
}
