//! Exact subword token counting backed by the `tokenizers` crate.

use anyhow::{anyhow, Result};
use std::path::Path;
use tokenizers::Tokenizer;

use lectern_core::traits::TokenCounter;

/// Counts tokens with the same tokenizer the embedding model uses, so chunk
/// budgets line up with what the encoder actually sees.
pub struct SubwordCounter {
    tokenizer: Tokenizer,
}

impl SubwordCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for SubwordCounter {
    fn count(&self, text: &str) -> usize {
        // Tokenizer failures are not worth failing a chunking run over;
        // fall back to the character estimate.
        match self.tokenizer.encode(text, false) {
            Ok(enc) => enc.get_ids().len(),
            Err(_) => text.chars().count() / 4,
        }
    }
}
