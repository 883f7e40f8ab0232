use tempfile::TempDir;

use lectern_core::traits::{Embedder, VectorStore};
use lectern_core::types::{FileType, MetadataFilter, PageSpan, Segment, SourceRef};
use lectern_embed::HashEmbedder;
use lectern_store::LanceStore;

const DIM: usize = 64;

fn segment(id: &str, source_id: &str, page: Option<u32>, text: &str) -> Segment {
    Segment {
        id: id.to_string(),
        text: text.to_string(),
        source: SourceRef {
            source_id: source_id.to_string(),
            pages: page.map(PageSpan::single),
        },
        title: "Biology 101".to_string(),
        file_type: if page.is_some() { FileType::Pdf } else { FileType::Txt },
        course_id: None,
    }
}

async fn seeded_store(dir: &TempDir) -> (LanceStore, HashEmbedder) {
    let store = LanceStore::open(dir.path(), "segments", DIM).await.expect("open store");
    let embedder = HashEmbedder::new(DIM);
    let segments = vec![
        segment("bio_p1_c0", "bio.pdf", Some(1), "the mitochondria is the powerhouse of the cell"),
        segment("bio_p2_c0", "bio.pdf", Some(2), "the library closes at midnight on weekdays"),
        segment("notes_c0", "notes.txt", None, "photosynthesis converts light into energy"),
    ];
    let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");
    store.upsert(&segments, &vectors).await.expect("upsert");
    (store, embedder)
}

#[tokio::test]
async fn upsert_then_count_and_query() {
    let dir = TempDir::new().unwrap();
    let (store, embedder) = seeded_store(&dir).await;

    assert_eq!(store.count().await.unwrap(), 3);

    let query = embedder.embed("mitochondria powerhouse cell").unwrap();
    let hits = store.query(&query, 2, None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].segment.id, "bio_p1_c0");
    assert!(hits[0].similarity() >= hits[1].similarity());
    assert_eq!(hits[0].vector.len(), DIM);
    assert_eq!(hits[0].segment.source.pages, Some(PageSpan::single(1)));
}

#[tokio::test]
async fn reupserting_the_same_ids_does_not_duplicate() {
    let dir = TempDir::new().unwrap();
    let (store, embedder) = seeded_store(&dir).await;

    let seg = segment("bio_p1_c0", "bio.pdf", Some(1), "the mitochondria is the powerhouse");
    let vectors = embedder.embed_batch(&[seg.text.clone()]).unwrap();
    store.upsert(&[seg], &vectors).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn delete_where_removes_only_the_matching_source() {
    let dir = TempDir::new().unwrap();
    let (store, _) = seeded_store(&dir).await;

    let removed =
        store.delete_where(&MetadataFilter::Source("bio.pdf".to_string())).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(
        store.count_where(&MetadataFilter::Source("notes.txt".to_string())).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn scan_returns_the_full_corpus() {
    let dir = TempDir::new().unwrap();
    let (store, _) = seeded_store(&dir).await;

    let mut ids: Vec<String> =
        store.scan().await.unwrap().into_iter().map(|s| s.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["bio_p1_c0", "bio_p2_c0", "notes_c0"]);
}

#[tokio::test]
async fn empty_store_yields_empty_results_not_errors() {
    let dir = TempDir::new().unwrap();
    let store = LanceStore::open(dir.path(), "segments", DIM).await.unwrap();
    let embedder = HashEmbedder::new(DIM);

    let query = embedder.embed("anything at all").unwrap();
    assert!(store.query(&query, 5, None).await.unwrap().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(
        store.delete_where(&MetadataFilter::Source("missing".to_string())).await.unwrap(),
        0
    );
    assert!(store.scan().await.unwrap().is_empty());
}
