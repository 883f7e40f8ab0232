use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::config::RetrievalSettings;
use lectern_core::error::LecternError;
use lectern_core::traits::{Embedder, Retriever, VectorStore};
use lectern_core::types::{ScoredSegment, Segment, StoredHit};
use lectern_lexical::{LexicalHolder, LexicalIndex};

use crate::fusion::{reciprocal_rank_fusion, vector_candidates, Candidate};
use crate::mmr;

/// Orchestrates one retrieval pass: vector candidates, optional lexical
/// fusion, MMR diversity reranking, score-threshold filtering.
///
/// Whether lexical fusion runs is decided once at construction by whether a
/// `LexicalHolder` is injected; there is no per-call branching on backends.
/// The engine never mutates the store, and an empty corpus retrieves to an
/// empty list rather than an error.
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    lexical: Option<Arc<LexicalHolder>>,
    settings: RetrievalSettings,
    timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        lexical: Option<Arc<LexicalHolder>>,
        settings: RetrievalSettings,
    ) -> Result<Self, LecternError> {
        let settings = settings.validated()?;
        let timeout = settings.provider_timeout();
        Ok(Self { store, embedder, lexical, settings, timeout })
    }

    /// Candidate pool fetched per list, before reranking narrows to top_k.
    fn fetch_k(&self) -> usize {
        self.settings.top_k * 2
    }

    async fn with_timeout<T, F>(&self, what: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(LecternError::Timeout(self.timeout)).context(what)),
        }
    }

    /// Embedding is compute-bound; run it off the async threads.
    async fn embed_off_thread(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = self.embedder.clone();
        let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts));
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(anyhow!(LecternError::Timeout(self.timeout)).context("query embedding")),
            Ok(join) => join
                .map_err(|e| anyhow!("embedding task failed: {e}"))?
                .map_err(|e| anyhow!(LecternError::Embedding(format!("{e:#}")))),
        }
    }

    async fn lexical_index(&self, holder: &Arc<LexicalHolder>) -> Result<Arc<LexicalIndex>> {
        if let Some(index) = holder.get() {
            return Ok(index);
        }
        let snapshot = self
            .with_timeout("corpus snapshot for lexical index", self.store.scan())
            .await?;
        let holder = holder.clone();
        tokio::task::spawn_blocking(move || {
            holder.get_or_build(|| LexicalIndex::build(&snapshot))
        })
        .await
        .map_err(|e| anyhow!("lexical index build task failed: {e}"))?
    }

    async fn candidate_pool(
        &self,
        query: &str,
        query_vector: &[f32],
    ) -> Result<Vec<Candidate>> {
        let vector_hits: Vec<StoredHit> = self
            .with_timeout(
                "vector store query",
                self.store.query(query_vector, self.fetch_k(), None),
            )
            .await?;

        match &self.lexical {
            Some(holder) => {
                let index = self.lexical_index(holder).await?;
                let lexical_hits: Vec<(Segment, f32)> = index.search(query, self.fetch_k())?;
                Ok(reciprocal_rank_fusion(vector_hits, lexical_hits))
            }
            None => Ok(vector_candidates(vector_hits)),
        }
    }

    /// Embed any candidate that arrived without an ingestion-time vector
    /// (lexical-only hits) so MMR can compare the full pool.
    async fn fill_missing_vectors(&self, pool: &mut [Candidate]) -> Result<()> {
        let missing: Vec<usize> =
            (0..pool.len()).filter(|&i| pool[i].vector.is_none()).collect();
        if missing.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = missing.iter().map(|&i| pool[i].segment.text.clone()).collect();
        let vectors = self.embed_off_thread(texts).await?;
        for (&i, vector) in missing.iter().zip(vectors) {
            pool[i].vector = Some(vector);
        }
        Ok(())
    }
}

#[async_trait]
impl Retriever for RetrievalEngine {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredSegment>> {
        let top_k = self.settings.top_k;
        let query_vector = self
            .embed_off_thread(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!(LecternError::Embedding("no query vector".to_string())))?;

        let mut pool = self.candidate_pool(query, &query_vector).await?;

        if self.settings.use_mmr && pool.len() > top_k {
            self.fill_missing_vectors(&mut pool).await?;
            pool = mmr::rerank(
                &query_vector,
                pool,
                top_k,
                self.settings.mmr_diversity,
            );
        } else {
            pool.truncate(top_k);
        }

        let before = pool.len();
        let results: Vec<ScoredSegment> = pool
            .into_iter()
            .filter(|c| c.score >= self.settings.score_threshold)
            .map(|c| ScoredSegment { segment: c.segment, score: c.score, origin: c.origin })
            .collect();
        tracing::debug!(
            kept = results.len(),
            dropped = before - results.len(),
            "retrieval finished"
        );
        Ok(results)
    }
}
