#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const TABLE_NAME: &str = "chunks";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    persist_dir: PathBuf,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the index at `persist_dir`, creating the directory when absent.
    ///
    /// The chunk table itself is created on the first insert, once the vector
    /// dimension is known.
    #[inline]
    pub async fn open(persist_dir: &Path) -> Result<Self> {
        debug!("Opening LanceDB at path: {:?}", persist_dir);

        std::fs::create_dir_all(persist_dir).map_err(|e| {
            RagError::Database(format!(
                "Failed to create index directory {}: {}",
                persist_dir.display(),
                e
            ))
        })?;

        Self::connect(persist_dir).await
    }

    /// Open an index that must already hold a chunk table
    #[inline]
    pub async fn open_existing(persist_dir: &Path) -> Result<Self> {
        if !persist_dir.is_dir() {
            return Err(RagError::IndexNotFound(persist_dir.to_path_buf()));
        }

        let store = Self::connect(persist_dir).await?;
        if store.vector_dimension.is_none() {
            return Err(RagError::IndexNotFound(persist_dir.to_path_buf()));
        }
        Ok(store)
    }

    async fn connect(persist_dir: &Path) -> Result<Self> {
        let uri = persist_dir.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            persist_dir: persist_dir.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        };

        if store.has_table().await? {
            let dim = store.detect_existing_vector_dimension().await?;
            debug!("Detected existing vector dimension: {}", dim);
            store.vector_dimension = Some(dim);
        }

        Ok(store)
    }

    #[inline]
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// Dimension of the stored vectors, `None` before the first insert
    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    #[inline]
    pub async fn has_table(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        RagError::Database(format!("Invalid vector dimension {}", size))
                    });
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
        let list_size = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension {} too large", vector_dim)))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    list_size,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("source_row", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ])))
    }

    /// Append records to the chunk table.
    ///
    /// Every vector must share the dimension of the table; a mismatch is an
    /// `EmbedderMismatch` error and nothing is written.
    #[inline]
    pub async fn store_embeddings_batch(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(RagError::Embedding(
                "Embedder returned an empty vector".to_string(),
            ));
        }

        let expected = self.vector_dimension.unwrap_or(vector_dim);
        if let Some(record) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(RagError::EmbedderMismatch {
                expected,
                actual: record.vector.len(),
            });
        }

        debug!("Storing batch of {} embeddings", records.len());

        if self.vector_dimension.is_none() {
            info!("Creating {} table with {} dimensions", self.table_name, vector_dim);
            self.connection
                .create_empty_table(&self.table_name, Self::create_schema(vector_dim)?)
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
            self.vector_dimension = Some(vector_dim);
        }

        let record_batch = Self::create_record_batch(records, vector_dim)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut contents = Vec::with_capacity(len);
        let mut source_rows = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            contents.push(record.metadata.content.as_str());
            source_rows.push(record.metadata.source_row);
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let schema = Self::create_schema(vector_dim)?;

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let list_size = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension {} too large", vector_dim)))?;
        let vector_array =
            FixedSizeListArray::try_new(field, list_size, Arc::new(values_array), None).map_err(
                |e| RagError::Database(format!("Failed to create vector array: {}", e)),
            )?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(source_rows)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Top-`limit` chunks by cosine distance, nearest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let Some(dimension) = self.vector_dimension else {
            return Err(RagError::IndexNotFound(self.persist_dir.clone()));
        };
        if query_vector.len() != dimension {
            return Err(RagError::EmbedderMismatch {
                expected: dimension,
                actual: query_vector.len(),
            });
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = self.parse_search_results_stream(results).await?;
        // Batches may arrive in any order
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let contents = string_column(batch, "content")?;
        let source_rows = u32_column(batch, "source_row")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let created_ats = string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let search_results = (0..batch.num_rows())
            .map(|row| {
                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    chunk_metadata: ChunkMetadata {
                        content: contents.value(row).to_string(),
                        source_row: source_rows.value(row),
                        chunk_index: chunk_indices.value(row),
                        created_at: created_ats.value(row).to_string(),
                    },
                    // Cosine distance lies in [0, 2]
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(search_results)
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        if self.vector_dimension.is_none() {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop every stored chunk; the next insert recreates the table
    #[inline]
    pub async fn clear(&mut self) -> Result<()> {
        if self.has_table().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        self.vector_dimension = None;
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}
