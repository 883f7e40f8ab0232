use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Arrow schema for the segments table. `dim` is fixed per store instance
/// and must match the embedder that produced the vectors.
///
/// Page columns use 0 as the "not paginated" sentinel so they can stay
/// non-nullable; the adapter maps 0 back to `None`.
pub fn segments_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("file_type", DataType::Utf8, false),
        Field::new("course_id", DataType::Utf8, true),
        Field::new("page_start", DataType::Int32, false),
        Field::new("page_end", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}
