// Shared fixtures for the integration tests
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use qc_rag::embeddings::{Embedder, Generator};
use qc_rag::rag::RagPipeline;

pub const DIMENSION: usize = 64;

/// Bag-of-words vectors: each lowercase word bumps one hashed axis
pub struct HashingEmbedder;

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-test"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| hash_embedding(text)).collect())
    }
}

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }
    // Keeps empty text away from the zero vector
    vector[0] += 0.01;
    vector
}

/// Returns a fixed answer regardless of the prompt
pub struct StubGenerator(pub &'static str);

impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn generate(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

pub const LONG_ANSWER: &str = "Scratches on the surface come from handling damage during transfer.";

pub fn pipeline_answering(answer: &'static str) -> RagPipeline {
    RagPipeline::new(Arc::new(HashingEmbedder), Arc::new(StubGenerator(answer)))
}

pub fn write_table(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("should write test table");
    path
}

pub const DEFECTS_CSV: &str = "\
defect_description,process_parameters,inspection_result,operator
scratch on surface,temp=200 speed=3,fail,alice
dent near edge,press=40,fail,bob
crack in weld seam,current=120,fail,carol
no visible defect,temp=180,pass,dave
";

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}
