// Database module
// Persisted vector index: LanceDB table plus the JSON manifest beside it

pub mod lancedb;
pub mod manifest;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkMetadata, EmbeddingRecord};
pub use manifest::{IndexManifest, MANIFEST_FILE};
