//! Deterministic hashing embedder.
//!
//! Projects whitespace tokens onto hashed axes and L2-normalizes the result.
//! Not semantically meaningful, but deterministic and dependency-free at
//! runtime, which is what tests and offline runs need.

use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use lectern_core::traits::Embedder;

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_embeds_identically() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("the cell membrane").unwrap();
        let b = embedder.embed("the cell membrane").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn vectors_are_unit_norm() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("some words to hash").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn overlapping_text_is_closer_than_disjoint_text() {
        let embedder = HashEmbedder::new(128);
        let query = embedder.embed("mitochondria cell energy").unwrap();
        let related = embedder.embed("the mitochondria produces cell energy").unwrap();
        let unrelated = embedder.embed("tuition payment deadline form").unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }
}
