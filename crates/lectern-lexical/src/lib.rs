//! In-process lexical index.
//!
//! Term-frequency (BM25) scoring over a full corpus snapshot. An index is
//! built wholesale in RAM and frozen; refreshing the corpus means building a
//! new one. `LexicalHolder` provides the lazy build-once handle.

pub mod holder;
pub mod index;
mod tantivy_utils;

pub use holder::LexicalHolder;
pub use index::LexicalIndex;
