// RAG module
// Index build and the retrieve-then-generate query path


pub mod fallback;
pub mod retriever;
pub mod synthesizer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{EmbeddingRecord, IndexManifest, VectorStore};
use crate::embeddings::chunking::truncate_chars;
use crate::embeddings::{ChunkingConfig, ContentChunk, Embedder, Generator, chunk_units};
use crate::table::TextUnit;
use crate::{RagError, Result};

pub use fallback::{AGENT_NOT_CONFIGURED, MIN_ANSWER_LENGTH, WebSearchAgent, answer_with_fallback};
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use synthesizer::{AnswerSynthesizer, SYSTEM_PROMPT, build_prompt};

pub const DEFAULT_SNIPPET_LENGTH: usize = 500;
const DEFAULT_BATCH_SIZE: usize = 64;

/// What a build does with entries already in the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Add the new entries next to the existing ones
    #[default]
    Append,
    /// Drop existing entries before writing
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub units: usize,
    pub chunks_indexed: usize,
    pub total_entries: u64,
    pub persist_dir: PathBuf,
}

/// A retrieved chunk as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "page_content")]
    pub snippet: String,
    pub source_row: u32,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Build and query a persisted chunk index with injected model capabilities
#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    chunking: ChunkingConfig,
    batch_size: usize,
    top_k: usize,
    snippet_length: usize,
}

impl RagPipeline {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            generator,
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            top_k: DEFAULT_TOP_K,
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }

    #[inline]
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self::new(embedder, generator)
            .with_chunking(config.chunking.clone())
            .with_batch_size(config.provider.batch_size as usize)
            .with_top_k(config.index.top_k)
            .with_snippet_length(config.index.snippet_length)
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[inline]
    pub fn with_snippet_length(mut self, snippet_length: usize) -> Self {
        self.snippet_length = snippet_length;
        self
    }

    /// Chunk, embed and persist `units` under `persist_dir`.
    ///
    /// Nothing is written when no chunk survives splitting or when embedding
    /// fails. Concurrent builds into one directory are not coordinated.
    #[inline]
    pub async fn build_index(
        &self,
        units: &[TextUnit],
        persist_dir: &Path,
        mode: BuildMode,
    ) -> Result<BuildReport> {
        let chunks = chunk_units(units, &self.chunking);
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        info!(
            "Indexing {} chunks from {} units into {}",
            chunks.len(),
            units.len(),
            persist_dir.display()
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let dimension = vectors.first().map_or(0, Vec::len);

        let mut store = VectorStore::open(persist_dir).await?;

        let mut manifest = match mode {
            BuildMode::Replace => {
                info!("Replacing existing index at {}", persist_dir.display());
                store.clear().await?;
                IndexManifest::remove(persist_dir)?;
                None
            }
            BuildMode::Append => IndexManifest::load(persist_dir)?,
        };

        if let Some(existing) = &manifest {
            existing.check(self.embedder.model_name(), dimension)?;
        } else if let Some(stored) = store.vector_dimension() {
            if stored != dimension {
                return Err(RagError::EmbedderMismatch {
                    expected: stored,
                    actual: dimension,
                });
            }
        }

        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect();
        store.store_embeddings_batch(&records).await?;

        let manifest = match manifest.as_mut() {
            Some(existing) => {
                existing.touch();
                existing.clone()
            }
            None => IndexManifest::new(self.embedder.model_name(), dimension),
        };
        manifest.save(persist_dir)?;

        let total_entries = store.count_embeddings().await?;
        info!(
            "Index at {} now holds {} entries",
            persist_dir.display(),
            total_entries
        );

        Ok(BuildReport {
            units: units.len(),
            chunks_indexed: chunks.len(),
            total_entries,
            persist_dir: persist_dir.to_path_buf(),
        })
    }

    /// Embed every chunk in batches of `batch_size`, preserving order
    async fn embed_chunks(&self, chunks: &[ContentChunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let batch_vectors = self.embed_texts(texts).await?;

            if batch_vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Embedder returned {} vectors for {} inputs",
                    batch_vectors.len(),
                    batch.len()
                )));
            }
            debug!("Embedded batch of {} chunks", batch.len());
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))
    }

    /// Answer `question` from the index at `persist_dir`
    #[inline]
    pub async fn query(&self, question: &str, persist_dir: &Path) -> Result<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Input("Provide a question to ask".to_string()));
        }

        let store = VectorStore::open_existing(persist_dir).await?;

        let query_vector = self
            .embed_texts(vec![question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Embedder returned no vector".to_string()))?;

        match IndexManifest::load(persist_dir)? {
            Some(manifest) => manifest.check(self.embedder.model_name(), query_vector.len())?,
            None => warn!(
                "No manifest found in {}; skipping embedder identity check",
                persist_dir.display()
            ),
        }

        let retrieved = Retriever::new(&store, self.top_k)
            .retrieve(&query_vector)
            .await?;

        let contexts: Vec<String> = retrieved
            .iter()
            .map(|r| r.chunk_metadata.content.clone())
            .collect();

        let synthesizer = AnswerSynthesizer::new(Arc::clone(&self.generator));
        let owned_question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            synthesizer.synthesize(&owned_question, &contexts)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Generation task failed: {}", e)))??;

        let sources = retrieved
            .into_iter()
            .map(|r| Source {
                snippet: truncate_chars(&r.chunk_metadata.content, self.snippet_length),
                source_row: r.chunk_metadata.source_row,
                score: r.similarity_score,
            })
            .collect();

        Ok(QueryResult { answer, sources })
    }
}
