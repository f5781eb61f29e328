
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::{RagError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
const FORMAT_VERSION: u32 = 1;

/// Embedder identity recorded next to the vector table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexManifest {
    #[inline]
    pub fn new(embedding_model: &str, dimension: usize) -> Self {
        let now = Utc::now();
        Self {
            format_version: FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimension,
            created_at: now,
            updated_at: now,
        }
    }

    /// Read the manifest in `persist_dir`, `None` when the index predates it
    #[inline]
    pub fn load(persist_dir: &Path) -> Result<Option<Self>> {
        let path = persist_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            RagError::Database(format!("Invalid manifest at {}: {}", path.display(), e))
        })?;
        Ok(Some(manifest))
    }

    #[inline]
    pub fn save(&self, persist_dir: &Path) -> Result<()> {
        let path = persist_dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Database(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&path, content)?;
        debug!("Wrote index manifest to {}", path.display());
        Ok(())
    }

    #[inline]
    pub fn remove(persist_dir: &Path) -> Result<()> {
        let path = persist_dir.join(MANIFEST_FILE);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    #[inline]
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Fail on a dimension change, warn on a model rename
    #[inline]
    pub fn check(&self, embedding_model: &str, dimension: usize) -> Result<()> {
        if self.dimension != dimension {
            return Err(RagError::EmbedderMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }

        if self.embedding_model != embedding_model {
            warn!(
                "Index was built with embedding model '{}' but '{}' is configured; results may be poor",
                self.embedding_model, embedding_model
            );
        }

        Ok(())
    }
}
