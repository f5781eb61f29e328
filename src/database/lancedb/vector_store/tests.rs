use super::*;
use tempfile::TempDir;

fn record(row: u32, content: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: format!("id-{}", row),
        vector,
        metadata: ChunkMetadata {
            content: content.to_string(),
            source_row: row,
            chunk_index: 0,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

fn sample_records() -> Vec<EmbeddingRecord> {
    vec![
        record(0, "scratch on surface", vec![1.0, 0.0, 0.0]),
        record(1, "dent near edge", vec![0.0, 1.0, 0.0]),
        record(2, "discoloration", vec![0.0, 0.0, 1.0]),
    ]
}

#[tokio::test]
async fn open_creates_directory_without_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let persist_dir = temp_dir.path().join("nested").join("index");

    let store = VectorStore::open(&persist_dir)
        .await
        .expect("should open vector store");

    assert!(persist_dir.is_dir());
    assert_eq!(store.table_name, TABLE_NAME);
    assert_eq!(store.vector_dimension(), None);
    assert!(!store.has_table().await.expect("should list tables"));
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}

#[tokio::test]
async fn open_existing_requires_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("never_built");

    let result = VectorStore::open_existing(&missing).await;
    assert!(matches!(result, Err(RagError::IndexNotFound(path)) if path == missing));
}

#[tokio::test]
async fn open_existing_requires_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = VectorStore::open_existing(temp_dir.path()).await;
    assert!(matches!(result, Err(RagError::IndexNotFound(_))));
}

#[tokio::test]
async fn store_and_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store embeddings");
    assert_eq!(store.vector_dimension(), Some(3));
    drop(store);

    let reopened = VectorStore::open_existing(temp_dir.path())
        .await
        .expect("index should exist after a build");
    assert_eq!(reopened.vector_dimension(), Some(3));
    assert_eq!(reopened.count_embeddings().await.expect("should count"), 3);
}

#[tokio::test]
async fn second_batch_appends() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store first batch");
    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store second batch");

    assert_eq!(store.count_embeddings().await.expect("should count"), 6);
}

#[tokio::test]
async fn empty_batch_is_a_noop() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&[])
        .await
        .expect("empty batch should succeed");
    assert!(!store.has_table().await.expect("should list tables"));
}

#[tokio::test]
async fn mixed_dimensions_are_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store embeddings");

    let result = store
        .store_embeddings_batch(&[record(9, "other", vec![1.0, 0.0])])
        .await;

    assert!(matches!(
        result,
        Err(RagError::EmbedderMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(store.count_embeddings().await.expect("should count"), 3);
}

#[tokio::test]
async fn search_ranks_by_cosine_distance() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store embeddings");

    // Scaled copy of the first vector: cosine ignores magnitude
    let results = store
        .search_similar(&[5.0, 0.5, 0.0], 2)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_metadata.content, "scratch on surface");
    assert_eq!(results[0].chunk_metadata.source_row, 0);
    assert_eq!(results[1].chunk_metadata.content, "dent near edge");
    assert!(results[0].distance <= results[1].distance);
    assert!(results[0].similarity_score > 0.9);
}

#[tokio::test]
async fn search_with_wrong_dimension_is_a_mismatch() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store embeddings");

    let result = store.search_similar(&[1.0, 0.0], 4).await;
    assert!(matches!(result, Err(RagError::EmbedderMismatch { .. })));
}

#[tokio::test]
async fn clear_drops_entries_and_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    store
        .store_embeddings_batch(&sample_records())
        .await
        .expect("should store embeddings");
    store.clear().await.expect("should clear");

    assert_eq!(store.vector_dimension(), None);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);

    store
        .store_embeddings_batch(&[record(0, "new dimension", vec![1.0, 0.0])])
        .await
        .expect("cleared store accepts any dimension");
    assert_eq!(store.vector_dimension(), Some(2));
}
