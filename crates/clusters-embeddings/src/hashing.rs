//! Deterministic feature-hashing embedder.
//!
//! Each lowercase word and adjacent word pair is hashed (FNV-1a) into one of
//! `dimension` buckets with a hash-derived sign. Texts sharing vocabulary end
//! up close in cosine space. No model files, identical output on every run.

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Feature-hashing embedder.
pub struct HashingEmbedder {
    info: ModelInfo,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "hashing dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            info: ModelInfo {
                name: format!("feature-hashing-{}", dimension),
                dimension,
                max_sequence_length: 0,
            },
        })
    }

    fn add_feature(&self, values: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.info.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        values[bucket] += sign * weight;
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut values = vec![0.0f32; self.info.dimension];
        for word in &words {
            self.add_feature(&mut values, word, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut values, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed("Rust ownership rules").unwrap();
        let b = embedder.embed("Rust ownership rules").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimension(), 128);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed("Hello, World!").unwrap();
        let b = embedder.embed("hello world").unwrap();
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let cat1 = embedder.embed("the cat sat on the mat").unwrap();
        let cat2 = embedder.embed("a cat sat on a mat").unwrap();
        let other = embedder.embed("quarterly revenue projections").unwrap();
        assert!(cat1.cosine_similarity(&cat2) > cat1.cosine_similarity(&other));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let emb = embedder.embed("  ...  ").unwrap();
        assert!(emb.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_embed_texts_preserves_order() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed_texts(&texts).unwrap();
        assert_eq!(batch[0], embedder.embed("alpha").unwrap());
        assert_eq!(batch[1], embedder.embed("beta").unwrap());
    }
}
