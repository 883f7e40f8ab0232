//! LanceDB-backed vector store adapter.
//!
//! Implements the `VectorStore` trait over a local LanceDB table: cosine
//! distance, metadata-scoped deletion, full-corpus scans for lexical index
//! rebuilds.

mod schema;
mod table;

pub use schema::segments_schema;
pub use table::LanceStore;
