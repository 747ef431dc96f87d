//! Durable storage of documents, chunks and their embeddings.
//!
//! The store is append-only: documents and chunks are written once and never
//! updated. Ids are assigned by the store, increase monotonically and are never
//! reused, so chunk ids double as the replay order for index rebuilds.
//!
//! ## Key Components
//!
//! - **DocumentStore**: async trait with the operations the engine relies on
//! - **SqliteStore**: SQLite implementation on top of sqlx
//! - **Embedding blobs**: native-endian f32 vectors, see [`encode_embedding`]
//!
//! ## Architecture
//!
//! ```text
//! RetrievalEngine ── DocumentStore ── SqliteStore (documents, chunks)
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, RetrievalError};

pub mod sqlite_store;

/// Database ID for a document.
pub type DocumentId = i64;

/// Database ID for a text chunk.
pub type ChunkId = i64;

/// One ingested source file's full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub content: String,
}

/// Document listing entry without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
}

/// A contiguous sub-span of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    /// Present only when the chunk was loaded together with its embedding
    pub embedding: Option<Vec<f32>>,
}

/// Row counts and a sampled size estimate for the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    /// Total chunks extrapolated from a random sample of documents
    pub estimated_chunks: f64,
}

/// Storage operations for documents and chunks. See module docs for details.
///
/// Every write is committed before the call returns. Looking up an id that does
/// not exist yields `Ok(None)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return its newly assigned id
    async fn add_document(&self, filename: &str, content: &str) -> Result<DocumentId>;

    /// Whether any document with this filename has been stored
    async fn document_exists(&self, filename: &str) -> Result<bool>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Most recently stored document with this filename
    async fn latest_document(&self, filename: &str) -> Result<Option<Document>>;

    /// All documents in ascending id order
    async fn get_all_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Insert a chunk with its encoded embedding and return the chunk id
    async fn add_chunk(
        &self,
        document_id: DocumentId,
        content: &str,
        embedding: &[u8],
    ) -> Result<ChunkId>;

    /// Get a chunk by id, without its embedding
    async fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>>;

    /// Chunks of one document in ascending id order, without embeddings
    async fn get_chunks_for_document(&self, document_id: DocumentId) -> Result<Vec<Chunk>>;

    /// All chunks in ascending id order, without embeddings
    async fn get_all_chunks(&self) -> Result<Vec<Chunk>>;

    /// All chunks in ascending id order, with embeddings
    async fn get_all_chunks_with_embeddings(&self) -> Result<Vec<Chunk>>;

    /// Up to `limit` chunks with embeddings whose id is greater than `after`,
    /// in ascending id order
    async fn chunks_with_embeddings_after(&self, after: ChunkId, limit: usize)
    -> Result<Vec<Chunk>>;

    /// Row counts plus a chunk estimate sampled from up to `sample_size` documents
    async fn stats(&self, sample_size: usize) -> Result<StoreStats>;

    /// Release the underlying connections
    async fn close(&self);
}

/// Encode an embedding as the opaque blob stored in the `chunks` table.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice::<f32, u8>(embedding).to_vec()
}

/// Decode a stored embedding blob.
pub fn decode_embedding(chunk_id: ChunkId, bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(RetrievalError::CorruptEmbedding {
            chunk_id,
            len: bytes.len(),
        });
    }
    Ok(bytemuck::allocation::pod_collect_to_vec::<u8, f32>(bytes))
}
