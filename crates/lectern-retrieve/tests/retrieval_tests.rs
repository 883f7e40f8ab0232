use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use lectern_core::config::RetrievalSettings;
use lectern_core::traits::{Embedder, Retriever, VectorStore};
use lectern_core::types::{
    FileType, MetadataFilter, Origin, PageSpan, Segment, SourceRef, StoredHit,
};
use lectern_lexical::LexicalHolder;
use lectern_retrieve::RetrievalEngine;

/// In-memory stand-in for the vector store: brute-force cosine ranking over
/// whatever was upserted.
#[derive(Default)]
struct MemoryStore {
    rows: std::sync::Mutex<Vec<(Segment, Vec<f32>)>>,
}

impl MemoryStore {
    fn seeded(rows: Vec<(Segment, Vec<f32>)>) -> Self {
        Self { rows: std::sync::Mutex::new(rows) }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, segments: &[Segment], vectors: &[Vec<f32>]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        for (s, v) in segments.iter().zip(vectors) {
            rows.retain(|(existing, _)| existing.id != s.id);
            rows.push((s.clone(), v.clone()));
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>> {
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<StoredHit> = rows
            .iter()
            .map(|(segment, v)| StoredHit {
                segment: segment.clone(),
                distance: 1.0 - cosine(vector, v),
                vector: v.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(s, _)| match filter {
            MetadataFilter::Source(id) => s.source.source_id != *id,
            MetadataFilter::Course(id) => s.course_id.as_deref() != Some(id.as_str()),
        });
        Ok(before - rows.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.lock().unwrap().len())
    }

    async fn count_where(&self, _filter: &MetadataFilter) -> Result<usize> {
        Ok(0)
    }

    async fn scan(&self) -> Result<Vec<Segment>> {
        Ok(self.rows.lock().unwrap().iter().map(|(s, _)| s.clone()).collect())
    }
}

/// A store whose every call fails, to check that provider errors propagate
/// instead of masquerading as empty results.
struct BrokenStore;

#[async_trait]
impl VectorStore for BrokenStore {
    async fn upsert(&self, _: &[Segment], _: &[Vec<f32>]) -> Result<()> {
        anyhow::bail!("store offline")
    }
    async fn query(
        &self,
        _: &[f32],
        _: usize,
        _: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>> {
        anyhow::bail!("store offline")
    }
    async fn delete_where(&self, _: &MetadataFilter) -> Result<usize> {
        anyhow::bail!("store offline")
    }
    async fn count(&self) -> Result<usize> {
        anyhow::bail!("store offline")
    }
    async fn count_where(&self, _: &MetadataFilter) -> Result<usize> {
        anyhow::bail!("store offline")
    }
    async fn scan(&self) -> Result<Vec<Segment>> {
        anyhow::bail!("store offline")
    }
}

/// Maps known texts to fixed vectors, so similarities in tests are exact.
struct ScriptedEmbedder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl ScriptedEmbedder {
    fn new(dim: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        let vectors =
            entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Self { dim, vectors }
    }
}

impl Embedder for ScriptedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no scripted vector for {t:?}"))
            })
            .collect()
    }
}

fn segment(id: &str, text: &str, page: u32) -> Segment {
    Segment {
        id: id.to_string(),
        text: text.to_string(),
        source: SourceRef::paged("bio.pdf", PageSpan::single(page)),
        title: "Biology 101".to_string(),
        file_type: FileType::Pdf,
        course_id: None,
    }
}

fn settings(top_k: usize, threshold: f32) -> RetrievalSettings {
    RetrievalSettings {
        top_k,
        score_threshold: threshold,
        use_mmr: true,
        mmr_diversity: 0.3,
        use_lexical_fusion: false,
        provider_timeout_secs: 5,
    }
}

fn biology_corpus() -> (Arc<MemoryStore>, Arc<ScriptedEmbedder>) {
    let mito = "the mitochondria is the powerhouse of the cell";
    let office = "office hours are wednesday afternoons";
    let store = Arc::new(MemoryStore::seeded(vec![
        (segment("bio_p1", mito, 1), vec![0.95, 0.05, 0.0]),
        (segment("bio_p2", office, 2), vec![0.0, 0.1, 0.9]),
    ]));
    let embedder = Arc::new(ScriptedEmbedder::new(
        3,
        &[
            ("cell mitochondria", vec![1.0, 0.0, 0.0]),
            (mito, vec![0.95, 0.05, 0.0]),
            (office, vec![0.0, 0.1, 0.9]),
        ],
    ));
    (store, embedder)
}

#[tokio::test]
async fn relevant_chunk_ranks_first_with_a_meaningful_score() {
    let (store, embedder) = biology_corpus();
    let engine =
        RetrievalEngine::new(store, embedder, None, settings(3, 0.3)).unwrap();

    let results = engine.retrieve("cell mitochondria").await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].segment.id, "bio_p1");
    assert!(results[0].score >= 0.3, "score was {}", results[0].score);
    assert_eq!(results[0].origin, Origin::Vector);
}

#[tokio::test]
async fn empty_corpus_retrieves_to_an_empty_list() {
    let store = Arc::new(MemoryStore::default());
    let embedder =
        Arc::new(ScriptedEmbedder::new(3, &[("anything", vec![1.0, 0.0, 0.0])]));
    let engine = RetrievalEngine::new(store, embedder, None, settings(4, 0.3)).unwrap();

    let results = engine.retrieve("anything").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn result_count_never_exceeds_top_k() {
    let mut rows = Vec::new();
    let mut entries: Vec<(String, Vec<f32>)> = Vec::new();
    for i in 0..10 {
        let text = format!("chunk number {i}");
        let v = vec![1.0, i as f32 * 0.01, 0.0];
        rows.push((segment(&format!("s{i}"), &text, i + 1), v.clone()));
        entries.push((text, v));
    }
    let store = Arc::new(MemoryStore::seeded(rows));
    let mut scripted: Vec<(&str, Vec<f32>)> =
        entries.iter().map(|(t, v)| (t.as_str(), v.clone())).collect();
    scripted.push(("query", vec![1.0, 0.0, 0.0]));
    let embedder = Arc::new(ScriptedEmbedder::new(3, &scripted));

    let engine = RetrievalEngine::new(store, embedder, None, settings(3, 0.0)).unwrap();
    let results = engine.retrieve("query").await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn raising_the_threshold_never_grows_the_result_set() {
    let (store, embedder) = biology_corpus();
    let mut counts = Vec::new();
    for threshold in [0.0f32, 0.5, 0.9] {
        let engine = RetrievalEngine::new(
            store.clone(),
            embedder.clone(),
            None,
            settings(3, threshold),
        )
        .unwrap();
        counts.push(engine.retrieve("cell mitochondria").await.unwrap().len());
    }
    assert!(counts[0] >= counts[1] && counts[1] >= counts[2]);
}

#[tokio::test]
async fn full_diversity_skips_the_near_duplicate() {
    // a is most relevant; b is nearly identical to a; c is less similar to a
    // but still relevant. With diversity_weight = 1 (λ = 0) the second pick
    // must avoid the near-duplicate.
    let a = "phase one of mitosis";
    let b = "phase one of mitosis explained";
    let c = "phase two of mitosis";
    let store = Arc::new(MemoryStore::seeded(vec![
        (segment("a", a, 1), vec![1.0, 0.0, 0.0]),
        (segment("b", b, 2), vec![0.999, 0.04, 0.0]),
        (segment("c", c, 3), vec![0.6, 0.8, 0.0]),
    ]));
    let embedder = Arc::new(ScriptedEmbedder::new(
        3,
        &[
            ("mitosis phases", vec![1.0, 0.0, 0.0]),
            (a, vec![1.0, 0.0, 0.0]),
            (b, vec![0.999, 0.04, 0.0]),
            (c, vec![0.6, 0.8, 0.0]),
        ],
    ));
    let engine = RetrievalEngine::new(
        store,
        embedder,
        None,
        RetrievalSettings {
            top_k: 2,
            score_threshold: 0.0,
            use_mmr: true,
            mmr_diversity: 1.0,
            use_lexical_fusion: false,
            provider_timeout_secs: 5,
        },
    )
    .unwrap();

    let results = engine.retrieve("mitosis phases").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].segment.id, "a");
    assert_eq!(results[1].segment.id, "c", "near-duplicate must not be second");
}

#[tokio::test]
async fn lexical_fusion_promotes_documents_found_by_both_paths() {
    let shared = "the krebs cycle releases energy";
    let vector_only = "cells contain many organelles";
    let store = Arc::new(MemoryStore::seeded(vec![
        (segment("v", vector_only, 1), vec![1.0, 0.0, 0.0]),
        (segment("s", shared, 2), vec![0.9, 0.1, 0.0]),
    ]));
    let embedder = Arc::new(ScriptedEmbedder::new(
        3,
        &[
            ("krebs cycle energy", vec![1.0, 0.0, 0.0]),
            (shared, vec![0.9, 0.1, 0.0]),
            (vector_only, vec![1.0, 0.0, 0.0]),
        ],
    ));
    let engine = RetrievalEngine::new(
        store,
        embedder,
        Some(Arc::new(LexicalHolder::new())),
        RetrievalSettings {
            top_k: 2,
            score_threshold: 0.0,
            use_mmr: false,
            mmr_diversity: 0.0,
            use_lexical_fusion: true,
            provider_timeout_secs: 5,
        },
    )
    .unwrap();

    let results = engine.retrieve("krebs cycle energy").await.unwrap();
    assert_eq!(results.len(), 2);
    // "s" appears in the vector list and the lexical list; "v" only in the
    // vector list, despite being the nearer neighbor.
    assert_eq!(results[0].segment.id, "s");
    assert_eq!(results[0].origin, Origin::Hybrid);
}

#[tokio::test]
async fn provider_failure_propagates_instead_of_returning_empty() {
    let embedder =
        Arc::new(ScriptedEmbedder::new(3, &[("query", vec![1.0, 0.0, 0.0])]));
    let engine =
        RetrievalEngine::new(Arc::new(BrokenStore), embedder, None, settings(3, 0.3))
            .unwrap();

    let result = engine.retrieve("query").await;
    assert!(result.is_err());
}
