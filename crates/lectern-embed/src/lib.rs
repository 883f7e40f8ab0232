pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod token_count;
pub mod tokenize;

pub use hash::HashEmbedder;
pub use model::TransformerEmbedder;
pub use token_count::SubwordCounter;

use std::sync::Arc;

use lectern_core::config::EmbeddingSettings;
use lectern_core::traits::Embedder;

/// Build the embedder selected by configuration: the hashing embedder for
/// offline and test runs, otherwise the local transformer encoder.
pub fn build_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    let force_hash = std::env::var("APP_USE_HASH_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if settings.use_hash || force_hash {
        tracing::info!(dim = settings.dim, "using hashing embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    Ok(Arc::new(TransformerEmbedder::load(settings)?))
}
