use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};

use lectern_core::error::LecternError;
use lectern_core::traits::VectorStore;
use lectern_core::types::{
    FileType, MetadataFilter, PageSpan, Segment, SourceRef, StoredHit,
};

use crate::schema::segments_schema;

pub struct LanceStore {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceStore {
    pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        anyhow::ensure!(dim > 0, "vector dimension must be positive");
        let db = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| anyhow!(LecternError::Store(format!("connect failed: {e}"))))?;
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    async fn table(&self) -> Result<Option<Table>> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            Ok(Some(self.db.open_table(&self.table_name).execute().await?))
        } else {
            Ok(None)
        }
    }

    fn to_record_batch(&self, segments: &[Segment], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
        let schema = segments_schema(self.dim as i32);
        let mut ids = Vec::with_capacity(segments.len());
        let mut source_ids = Vec::with_capacity(segments.len());
        let mut titles = Vec::with_capacity(segments.len());
        let mut file_types = Vec::with_capacity(segments.len());
        let mut course_ids: Vec<Option<String>> = Vec::with_capacity(segments.len());
        let mut page_starts = Vec::with_capacity(segments.len());
        let mut page_ends = Vec::with_capacity(segments.len());
        let mut texts = Vec::with_capacity(segments.len());
        let mut vecs: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(segments.len());

        for (segment, vector) in segments.iter().zip(vectors) {
            anyhow::ensure!(
                vector.len() == self.dim,
                "vector for segment '{}' has dim {}, store expects {}",
                segment.id,
                vector.len(),
                self.dim
            );
            ids.push(segment.id.clone());
            source_ids.push(segment.source.source_id.clone());
            titles.push(segment.title.clone());
            file_types.push(segment.file_type.as_str().to_string());
            course_ids.push(segment.course_id.clone());
            let (start, end) = match segment.source.pages {
                Some(span) => (span.start as i32, span.end as i32),
                None => (0, 0),
            };
            page_starts.push(start);
            page_ends.push(end);
            texts.push(segment.text.clone());
            vecs.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(source_ids)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(file_types)),
                Arc::new(StringArray::from(course_ids)),
                Arc::new(Int32Array::from(page_starts)),
                Arc::new(Int32Array::from(page_ends)),
                Arc::new(StringArray::from(texts)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vecs.into_iter(), self.dim as i32)),
            ],
        )?;
        Ok(batch)
    }
}

fn predicate(filter: &MetadataFilter) -> String {
    match filter {
        MetadataFilter::Source(id) => format!("source_id = '{}'", escape(id)),
        MetadataFilter::Course(id) => format!("course_id = '{}'", escape(id)),
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn matches_filter(segment: &Segment, filter: &MetadataFilter) -> bool {
    match filter {
        MetadataFilter::Source(id) => segment.source.source_id == *id,
        MetadataFilter::Course(id) => segment.course_id.as_deref() == Some(id.as_str()),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("segments table is missing string column '{}'", name))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("segments table is missing int column '{}'", name))
}

fn decode_segment(batch: &RecordBatch, row: usize) -> Result<Segment> {
    let course_col = string_column(batch, "course_id")?;
    let course_id = if course_col.is_null(row) {
        None
    } else {
        Some(course_col.value(row).to_string())
    };
    let page_start = int_column(batch, "page_start")?.value(row);
    let page_end = int_column(batch, "page_end")?.value(row);
    let pages = if page_start > 0 {
        Some(PageSpan::new(page_start as u32, page_end.max(page_start) as u32))
    } else {
        None
    };
    let file_type_raw = string_column(batch, "file_type")?.value(row);
    let file_type = FileType::parse(file_type_raw)
        .ok_or_else(|| anyhow!("unknown file_type '{}' in segments table", file_type_raw))?;

    Ok(Segment {
        id: string_column(batch, "id")?.value(row).to_string(),
        text: string_column(batch, "text")?.value(row).to_string(),
        source: SourceRef {
            source_id: string_column(batch, "source_id")?.value(row).to_string(),
            pages,
        },
        title: string_column(batch, "title")?.value(row).to_string(),
        file_type,
        course_id,
    })
}

fn decode_vector(batch: &RecordBatch, row: usize) -> Result<Vec<f32>> {
    let col = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("segments table is missing its vector column"))?;
    let list = col.value(row);
    Ok(list.as_primitive::<arrow_array::types::Float32Type>().values().iter().copied().collect())
}

fn decode_distance(batch: &RecordBatch, row: usize) -> Result<f32> {
    let col = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("vector query returned no _distance column"))?;
    Ok(col.value(row))
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn upsert(&self, segments: &[Segment], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            segments.len() == vectors.len(),
            "segments and vectors differ in length: {} vs {}",
            segments.len(),
            vectors.len()
        );
        if segments.is_empty() {
            return Ok(());
        }

        let batch = self.to_record_batch(segments, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        match self.table().await? {
            Some(table) => {
                // Replace rows sharing an id so re-ingestion never duplicates.
                let id_list = segments
                    .iter()
                    .map(|s| format!("'{}'", escape(&s.id)))
                    .collect::<Vec<_>>()
                    .join(", ");
                table.delete(&format!("id IN ({id_list})")).await?;
                table.add(reader).execute().await?;
            }
            None => {
                self.db.create_table(&self.table_name, reader).execute().await?;
            }
        }
        tracing::debug!(count = segments.len(), "upserted segments");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>> {
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            vector.len() == self.dim,
            "query vector has dim {}, store expects {}",
            vector.len(),
            self.dim
        );

        // Over-fetch when a metadata filter will thin the rows afterwards.
        let fetch = if filter.is_some() { k * 4 } else { k };
        let mut stream = table
            .vector_search(vector.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(fetch)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            for row in 0..batch.num_rows() {
                let segment = decode_segment(&batch, row)?;
                if let Some(f) = filter {
                    if !matches_filter(&segment, f) {
                        continue;
                    }
                }
                hits.push(StoredHit {
                    segment,
                    distance: decode_distance(&batch, row)?,
                    vector: decode_vector(&batch, row)?,
                });
            }
        }
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize> {
        let Some(table) = self.table().await? else {
            return Ok(0);
        };
        let predicate = predicate(filter);
        let count = table.count_rows(Some(predicate.clone())).await?;
        if count > 0 {
            table.delete(&predicate).await?;
        }
        tracing::debug!(%predicate, count, "deleted segments");
        Ok(count)
    }

    async fn count(&self) -> Result<usize> {
        match self.table().await? {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    async fn count_where(&self, filter: &MetadataFilter) -> Result<usize> {
        match self.table().await? {
            Some(table) => Ok(table.count_rows(Some(predicate(filter))).await?),
            None => Ok(0),
        }
    }

    async fn scan(&self) -> Result<Vec<Segment>> {
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };
        let mut stream = table.query().execute().await?;
        let mut segments = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            for row in 0..batch.num_rows() {
                segments.push(decode_segment(&batch, row)?);
            }
        }
        Ok(segments)
    }
}
