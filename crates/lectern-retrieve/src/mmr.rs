//! Maximal marginal relevance reranking.
//!
//! Greedy selection balancing query relevance against similarity to the
//! already-selected set: `mmr = λ·rel − (1−λ)·max_sim`, with
//! `λ = 1 − diversity_weight`. The most relevant candidate is always picked
//! first; ties resolve to the earliest pool index, keeping the pass
//! deterministic.

use crate::fusion::Candidate;

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Select up to `top_k` candidates from `pool` in MMR order. The pool is
/// returned untouched when it is not larger than `top_k`. Candidates are
/// expected to carry vectors; one without scores 0 everywhere.
pub(crate) fn rerank(
    query_vector: &[f32],
    pool: Vec<Candidate>,
    top_k: usize,
    diversity_weight: f32,
) -> Vec<Candidate> {
    if pool.len() <= top_k {
        return pool;
    }
    let lambda = 1.0 - diversity_weight;

    let vectors: Vec<&[f32]> =
        pool.iter().map(|c| c.vector.as_deref().unwrap_or(&[])).collect();
    let relevance: Vec<f32> = vectors.iter().map(|v| cosine(query_vector, v)).collect();

    let mut selected: Vec<usize> = Vec::with_capacity(top_k);
    let mut remaining: Vec<usize> = (0..pool.len()).collect();

    // Highest-relevance candidate seeds the selection.
    let seed = argmax(remaining.iter().map(|&i| relevance[i]));
    selected.push(remaining.remove(seed));

    while selected.len() < top_k && !remaining.is_empty() {
        let best = argmax(remaining.iter().map(|&i| {
            let max_sim = selected
                .iter()
                .map(|&s| cosine(vectors[i], vectors[s]))
                .fold(f32::MIN, f32::max);
            lambda * relevance[i] - (1.0 - lambda) * max_sim
        }));
        selected.push(remaining.remove(best));
    }

    let mut slots: Vec<Option<Candidate>> = pool.into_iter().map(Some).collect();
    selected
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Index of the strictly greatest value; earlier wins ties.
fn argmax(values: impl Iterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::MIN;
    for (i, value) in values.enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.6f32, 0.8];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn argmax_prefers_the_earliest_tie() {
        assert_eq!(argmax([0.5f32, 0.9, 0.9, 0.1].into_iter()), 1);
    }
}
