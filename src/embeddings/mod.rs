// Embeddings module
// Chunking, the embedding/generation capability traits and the HTTP provider

pub mod chunking;
pub mod openai;

pub use chunking::{ChunkingConfig, ContentChunk, TextSplitter, chunk_units, split};
pub use openai::{ModelInfo, OpenAiClient, build_agent};

use anyhow::Result;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order.
/// Build and query must use embedders with the same model and dimension.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index manifest
    fn model_name(&self) -> &str;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedder returned no vector"))
    }
}

/// String-in, string-out language model call
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// `system` carries the instructions, `prompt` the grounded question
    fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}
