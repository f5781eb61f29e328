use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("No chunks extracted from the input: check the selected fields")]
    EmptyCorpus,

    #[error("Index directory not found at {}: index data first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error(
        "Embedder mismatch: index was built with {expected} dimensions but the embedder produced {actual}"
    )]
    EmbedderMismatch { expected: usize, actual: usize },

    #[error("Table error: {0}")]
    Table(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod rag;
pub mod table;
