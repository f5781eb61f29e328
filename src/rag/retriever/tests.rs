use super::*;
use crate::database::{ChunkMetadata, EmbeddingRecord};
use tempfile::TempDir;

fn unit_vector(dimension: usize, axis: usize) -> Vec<f32> {
    (0..dimension)
        .map(|i| if i == axis { 1.0 } else { 0.0 })
        .collect()
}

async fn store_with_rows(temp_dir: &TempDir, rows: usize) -> VectorStore {
    let mut store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    let records: Vec<EmbeddingRecord> = (0..rows)
        .map(|row| EmbeddingRecord {
            id: format!("id-{}", row),
            vector: unit_vector(rows, row),
            metadata: ChunkMetadata {
                content: format!("row {}", row),
                source_row: u32::try_from(row).expect("small row index"),
                chunk_index: 0,
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
        })
        .collect();

    store
        .store_embeddings_batch(&records)
        .await
        .expect("should store embeddings");
    store
}

#[tokio::test]
async fn returns_at_most_top_k_nearest_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = store_with_rows(&temp_dir, 6).await;
    let retriever = Retriever::new(&store, DEFAULT_TOP_K);

    let mut query = unit_vector(6, 2);
    query[5] = 0.5;
    let results = retriever.retrieve(&query).await.expect("should retrieve");

    assert_eq!(results.len(), DEFAULT_TOP_K);
    assert_eq!(results[0].chunk_metadata.content, "row 2");
    assert_eq!(results[1].chunk_metadata.content, "row 5");
}

#[tokio::test]
async fn fewer_entries_than_top_k() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = store_with_rows(&temp_dir, 2).await;
    let retriever = Retriever::new(&store, 10);

    let results = retriever
        .retrieve(&unit_vector(2, 0))
        .await
        .expect("should retrieve");

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn zero_top_k_is_raised_to_one() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path())
        .await
        .expect("should open vector store");

    assert_eq!(Retriever::new(&store, 0).top_k(), 1);
}
