#[cfg(test)]
mod tests;

use tracing::debug;

use crate::Result;
use crate::database::{SearchResult, VectorStore};

pub const DEFAULT_TOP_K: usize = 4;

/// Fixed top-k similarity retrieval over an opened index
pub struct Retriever<'a> {
    store: &'a VectorStore,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    #[inline]
    pub fn new(store: &'a VectorStore, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// At most `top_k` chunks, most similar first
    #[inline]
    pub async fn retrieve(&self, query_vector: &[f32]) -> Result<Vec<SearchResult>> {
        let mut results = self.store.search_similar(query_vector, self.top_k).await?;
        results.truncate(self.top_k);

        debug!(
            "Retrieved {} chunks (rows: {:?})",
            results.len(),
            results
                .iter()
                .map(|r| r.chunk_metadata.source_row)
                .collect::<Vec<_>>()
        );
        Ok(results)
    }
}
