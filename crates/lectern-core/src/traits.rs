use async_trait::async_trait;

use crate::types::{Message, MetadataFilter, ScoredSegment, Segment, StoredHit};

/// Text to fixed-dimension vector. Deterministic for identical input and
/// model version.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        anyhow::ensure!(!vectors.is_empty(), "embedder returned no vectors");
        Ok(vectors.remove(0))
    }
}

/// Persistent vector store. Cosine distance; similarity = 1 - distance.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace segments by id. `vectors[i]` belongs to
    /// `segments[i]` and must match the store's dimensionality.
    async fn upsert(&self, segments: &[Segment], vectors: &[Vec<f32>]) -> anyhow::Result<()>;

    /// Ranked nearest neighbors of `vector`, nearest first. An empty store
    /// yields an empty list, not an error.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> anyhow::Result<Vec<StoredHit>>;

    /// Delete every segment matching `filter`; returns how many were removed.
    async fn delete_where(&self, filter: &MetadataFilter) -> anyhow::Result<usize>;

    async fn count(&self) -> anyhow::Result<usize>;

    async fn count_where(&self, filter: &MetadataFilter) -> anyhow::Result<usize>;

    /// Full corpus snapshot, used to (re)build the lexical index.
    async fn scan(&self) -> anyhow::Result<Vec<Segment>>;
}

/// Ranked retrieval over the ingested corpus.
///
/// `Ok(vec![])` means "nothing relevant"; provider failures surface as
/// `Err` so callers can tell the two apart.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<ScoredSegment>>;
}

/// Answer-generation collaborator. May fail transiently; callers treat a
/// failure as terminal for the query.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> anyhow::Result<String>;

    fn backend_info(&self) -> String;
}

/// Pluggable token counting for the chunker. Implementations must be
/// deterministic; on tokenizer failure they estimate rather than error.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}
