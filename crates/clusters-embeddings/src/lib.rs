//! # clusters-embeddings
//!
//! Sentence embeddings for topic clustering.
//!
//! Two backends implement [`EmbeddingModel`]:
//! - [`CandleEmbedder`]: local all-MiniLM-L6-v2 inference via Candle
//!   (384 dimensions, model files cached after the first download)
//! - [`HashingEmbedder`]: deterministic feature hashing, no model files,
//!   used offline and in tests
//!
//! [`load_embedder`] picks the backend from [`clusters_types::EmbeddingSettings`].

pub mod cache;
pub mod candle;
pub mod error;
pub mod hashing;
pub mod model;

use std::sync::Arc;

use clusters_types::{EmbeddingBackend, EmbeddingSettings};

pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};

/// Build the embedder selected in settings.
///
/// The Candle backend downloads model files on first use, so call this
/// off the async executor.
pub fn load_embedder(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
    match settings.backend {
        EmbeddingBackend::Candle => {
            let cache = ModelCache::from_settings(settings);
            Ok(Arc::new(CandleEmbedder::load(&cache)?))
        }
        EmbeddingBackend::Hashing => {
            Ok(Arc::new(HashingEmbedder::new(settings.hashing_dimension)?))
        }
    }
}
