use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{doc, Index, IndexReader, TantivyDocument};

use lectern_core::types::Segment;

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// A frozen lexical index over one corpus snapshot.
///
/// The whole segment is stored alongside the indexed text so lexical hits
/// come back self-contained, without a second store lookup.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    id_field: tantivy::schema::Field,
    text_field: tantivy::schema::Field,
    segment_field: tantivy::schema::Field,
    size: usize,
}

impl LexicalIndex {
    pub fn build(segments: &[Segment]) -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index);
        let id_field = schema.get_field("id")?;
        let text_field = schema.get_field("text")?;
        let segment_field = schema.get_field("segment_json")?;

        let mut writer = index.writer(50_000_000)?;
        for segment in segments {
            writer.add_document(doc!(
                id_field => segment.id.clone(),
                text_field => segment.text.clone(),
                segment_field => serde_json::to_string(segment)?,
            ))?;
        }
        writer.commit()?;
        let reader = index.reader()?;
        tracing::info!(segments = segments.len(), "built lexical index");

        Ok(Self { index, reader, id_field, text_field, segment_field, size: segments.len() })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Ranked `(segment, bm25 score)` hits, best first. Unparseable query
    /// syntax is tolerated; only hard index errors propagate.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(Segment, f32)>> {
        if self.size == 0 || k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (parsed, _errors) = parser.parse_query_lenient(query);
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(k))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let Some(json) = doc.get_first(self.segment_field).and_then(|v| v.as_str()) else {
                anyhow::bail!("lexical index document is missing its stored segment");
            };
            let segment: Segment = serde_json::from_str(json)?;
            debug_assert_eq!(
                doc.get_first(self.id_field).and_then(|v| v.as_str()),
                Some(segment.id.as_str())
            );
            hits.push((segment, score));
        }
        Ok(hits)
    }
}
