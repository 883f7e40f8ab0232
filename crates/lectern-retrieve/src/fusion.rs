//! Reciprocal rank fusion of the vector and lexical candidate lists.

use std::collections::HashMap;

use lectern_core::types::{Origin, Segment, StoredHit};

/// The rank-smoothing constant from the original RRF formulation.
const RRF_K: f32 = 60.0;

/// A candidate flowing through fusion and reranking.
pub(crate) struct Candidate {
    pub segment: Segment,
    pub score: f32,
    pub origin: Origin,
    /// Ingestion-time vector when the candidate came through the vector
    /// path; lexical-only candidates are embedded on demand.
    pub vector: Option<Vec<f32>>,
}

/// Wrap plain vector hits as candidates, ranked as returned by the store.
pub(crate) fn vector_candidates(hits: Vec<StoredHit>) -> Vec<Candidate> {
    hits.into_iter()
        .map(|hit| Candidate {
            score: hit.similarity(),
            origin: Origin::Vector,
            vector: Some(hit.vector),
            segment: hit.segment,
        })
        .collect()
}

/// Merge both ranked lists: each document scores the sum of `1/(rank + 60)`
/// over every list containing it (ranks start at 1). Ties break by the
/// document's original vector rank, then by id for full determinism.
pub(crate) fn reciprocal_rank_fusion(
    vector_hits: Vec<StoredHit>,
    lexical_hits: Vec<(Segment, f32)>,
) -> Vec<Candidate> {
    struct Entry {
        segment: Segment,
        vector: Option<Vec<f32>>,
        vector_rank: usize,
        fused: f32,
    }

    let mut entries: HashMap<String, Entry> = HashMap::new();

    for (i, hit) in vector_hits.into_iter().enumerate() {
        let rank = i + 1;
        entries.insert(
            hit.segment.id.clone(),
            Entry {
                vector: Some(hit.vector),
                vector_rank: rank,
                fused: 1.0 / (rank as f32 + RRF_K),
                segment: hit.segment,
            },
        );
    }

    for (i, (segment, _bm25)) in lexical_hits.into_iter().enumerate() {
        let rank = i + 1;
        let contribution = 1.0 / (rank as f32 + RRF_K);
        entries
            .entry(segment.id.clone())
            .and_modify(|e| e.fused += contribution)
            .or_insert(Entry {
                segment,
                vector: None,
                vector_rank: usize::MAX,
                fused: contribution,
            });
    }

    let mut merged: Vec<Entry> = entries.into_values().collect();
    merged.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.vector_rank.cmp(&b.vector_rank))
            .then(a.segment.id.cmp(&b.segment.id))
    });

    merged
        .into_iter()
        .map(|e| Candidate {
            segment: e.segment,
            score: e.fused,
            origin: Origin::Hybrid,
            vector: e.vector,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::types::{FileType, SourceRef};

    fn hit(id: &str, distance: f32) -> StoredHit {
        StoredHit {
            segment: segment(id),
            distance,
            vector: vec![1.0, 0.0],
        }
    }

    fn segment(id: &str) -> Segment {
        Segment {
            id: id.to_string(),
            text: format!("text for {id}"),
            source: SourceRef::unpaged("doc"),
            title: "Doc".to_string(),
            file_type: FileType::Txt,
            course_id: None,
        }
    }

    #[test]
    fn a_document_in_both_lists_outranks_single_list_documents() {
        let fused = reciprocal_rank_fusion(
            vec![hit("a", 0.1), hit("b", 0.2)],
            vec![(segment("b"), 9.0)],
        );
        assert_eq!(fused[0].segment.id, "b");
        // 1/62 + 1/61 vs 1/61
        assert!(fused[0].score > fused[1].score);
        assert_eq!(fused[0].origin, Origin::Hybrid);
    }

    #[test]
    fn equal_fused_scores_fall_back_to_vector_rank() {
        // Same single-list contribution at the same rank; "a" ranked first
        // in the vector list must come first.
        let fused = reciprocal_rank_fusion(
            vec![hit("a", 0.1)],
            vec![(segment("z"), 5.0)],
        );
        assert_eq!(fused[0].segment.id, "a");
        assert_eq!(fused[1].segment.id, "z");
    }

    #[test]
    fn lexical_only_candidates_have_no_vector() {
        let fused = reciprocal_rank_fusion(vec![], vec![(segment("l"), 3.0)]);
        assert_eq!(fused.len(), 1);
        assert!(fused[0].vector.is_none());
    }
}
