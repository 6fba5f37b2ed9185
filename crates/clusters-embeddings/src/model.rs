//! Embedding model trait and types.

use crate::error::EmbeddingError;

/// Unit-length sentence vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create an embedding, normalizing to unit length.
    ///
    /// All-zero vectors are kept as-is.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            values.iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Mismatched dimensions score 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        // Both sides are unit length, so the dot product is the cosine
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    pub dimension: usize,
    /// Maximum sequence length in tokens (0 when unbounded)
    pub max_sequence_length: usize,
}

/// Trait for embedding models.
///
/// Calls are CPU-bound and synchronous; async callers should run them
/// on a blocking thread.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts, one per input in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Generate embeddings for multiple owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let embeddings = self.embed_batch(&refs)?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortModel {
        info: ModelInfo,
    }

    impl EmbeddingModel for ShortModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(Embedding::new(vec![1.0]))
        }

        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_is_kept() {
        let emb = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(emb.values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        let c = Embedding::new(vec![-2.0, 0.0]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 0.001);
        assert!(a.cosine_similarity(&b).abs() < 0.001);
        assert!((a.cosine_similarity(&c) + 1.0).abs() < 0.001);
        assert_eq!(a.cosine_similarity(&Embedding::new(vec![1.0])), 0.0);
    }

    #[test]
    fn test_embed_texts_checks_count() {
        let model = ShortModel {
            info: ModelInfo {
                name: "short".to_string(),
                dimension: 1,
                max_sequence_length: 0,
            },
        };
        let err = model
            .embed_texts(&["a".to_string(), "b".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 2,
                actual: 0
            }
        ));
    }
}
