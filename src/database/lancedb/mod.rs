// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::ContentChunk;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// UUID v4 assigned at build time
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Payload stored alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Chunk text exactly as it was embedded
    pub content: String,
    /// Zero-based index of the table row the chunk came from
    pub source_row: u32,
    /// Position of the chunk within its row
    pub chunk_index: u32,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Pair a chunk with its vector under a fresh id
    #[inline]
    pub fn from_chunk(chunk: &ContentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                content: chunk.content.clone(),
                source_row: u32::try_from(chunk.source_row).unwrap_or(u32::MAX),
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }
}
