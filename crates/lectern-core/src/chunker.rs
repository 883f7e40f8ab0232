//! Boundary-aware recursive text chunker.
//!
//! Splits normalized text into token-bounded, overlapping chunks. Separator
//! granularity descends from paragraph breaks to single spaces; a piece with
//! nothing left to split on is emitted oversized instead of looping. Output
//! is fully determined by the input text, the config and the token counter.

use serde::Deserialize;

use crate::traits::TokenCounter;

/// Separators in descending granularity. Past the last level a piece is
/// atomic and accepted as-is.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_tokens: 1000, overlap_tokens: 150 }
    }
}

impl ChunkingConfig {
    /// Enforce `overlap_tokens < target_tokens`, clamping with a warning
    /// rather than rejecting.
    pub fn clamped(mut self) -> Self {
        if self.target_tokens == 0 {
            tracing::warn!("chunking.target_tokens of 0 raised to 1");
            self.target_tokens = 1;
        }
        if self.overlap_tokens >= self.target_tokens {
            tracing::warn!(
                overlap = self.overlap_tokens,
                target = self.target_tokens,
                "chunking.overlap_tokens >= target_tokens, clamping"
            );
            self.overlap_tokens = self.target_tokens - 1;
        }
        self
    }
}

/// Estimates roughly four characters per token. Explicitly approximate;
/// used when no subword tokenizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl TokenCounter for CharEstimator {
    fn count(&self, text: &str) -> usize {
        text.chars().count() / 4
    }
}

pub struct Chunker<'a> {
    config: ChunkingConfig,
    counter: &'a dyn TokenCounter,
}

impl<'a> Chunker<'a> {
    pub fn new(config: ChunkingConfig, counter: &'a dyn TokenCounter) -> Self {
        Self { config: config.clamped(), counter }
    }

    /// Split `text` into chunks of at most `target_tokens` tokens, adjacent
    /// chunks sharing roughly `overlap_tokens` of trailing context. Atomic
    /// pieces may exceed the target. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_level(text, 0)
    }

    fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    fn split_level(&self, text: &str, level: usize) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.count(text) <= self.config.target_tokens {
            return vec![text.to_string()];
        }
        let Some(separator) = SEPARATORS.get(level) else {
            // Atomic: no separator left to try.
            return vec![text.to_string()];
        };
        if !text.contains(separator) {
            return self.split_level(text, level + 1);
        }
        self.pack(split_keeping_separator(text, separator), level)
    }

    /// Greedily pack pieces into chunks up to the token target. Closing a
    /// chunk seeds the next one with its trailing overlap.
    fn pack(&self, pieces: Vec<String>, level: usize) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        for piece in pieces {
            if self.count(&piece) > self.config.target_tokens {
                // Too big to pack whole; flush and recurse a level deeper.
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(self.split_level(&piece, level + 1));
                continue;
            }
            if !current.is_empty() {
                let mut candidate = current.clone();
                candidate.push_str(&piece);
                if self.count(&candidate) > self.config.target_tokens {
                    let closed = std::mem::take(&mut current);
                    current = self.overlap_seed(&closed, &piece);
                    chunks.push(closed);
                }
            }
            current.push_str(&piece);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    /// Trailing `overlap_tokens` worth of a closed chunk, shrunk further if
    /// needed so the seed plus the next piece stays within the target.
    fn overlap_seed(&self, closed: &str, next_piece: &str) -> String {
        if self.config.overlap_tokens == 0 {
            return String::new();
        }
        let total = self.count(closed);
        let mut seed = if total <= self.config.overlap_tokens {
            closed.to_string()
        } else {
            let chars: Vec<char> = closed.chars().collect();
            let keep = chars.len() * self.config.overlap_tokens / total;
            chars[chars.len() - keep..].iter().collect()
        };
        while !seed.is_empty() {
            let mut candidate = seed.clone();
            candidate.push_str(next_piece);
            if self.count(&candidate) <= self.config.target_tokens {
                break;
            }
            let mut iter = seed.chars();
            iter.next();
            seed = iter.collect();
        }
        seed
    }
}

/// Split on `separator`, re-attaching it to the left piece so no text is
/// lost and chunks rejoin to the original.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut pieces: Vec<String> = text.split(separator).map(str::to_string).collect();
    let last = pieces.len() - 1;
    for piece in &mut pieces[..last] {
        piece.push_str(separator);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_reattachment_loses_nothing() {
        let text = "one two three";
        let pieces = split_keeping_separator(text, " ");
        assert_eq!(pieces, vec!["one ", "two ", "three"]);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn overlap_clamped_below_target() {
        let config = ChunkingConfig { target_tokens: 50, overlap_tokens: 80 }.clamped();
        assert_eq!(config.overlap_tokens, 49);
    }
}
