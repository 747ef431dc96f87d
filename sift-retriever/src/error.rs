//! Error types for the retrieval pipeline

use std::path::PathBuf;

use crate::storage::ChunkId;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type for storage, index and orchestration failures.
///
/// A [`Storage`](Self::Storage) error aborts the call that hit it; rows committed
/// before the failure stay committed. An [`Embedding`](Self::Embedding) error
/// aborts only the batch in flight.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The relational store failed
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// A persisted artifact that was expected on disk does not exist
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The vector index file is truncated, tampered with, or from another format
    #[error("Corrupt vector index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// A stored embedding blob cannot be decoded into f32 values
    #[error("Corrupt embedding for chunk {chunk_id}: {len} bytes is not a whole number of f32 values")]
    CorruptEmbedding { chunk_id: ChunkId, len: usize },

    /// A vector does not have the dimension the index was built for
    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider failed
    #[error("Embedding error: {source}")]
    Embedding {
        #[from]
        source: sift_embed::EmbedError,
    },

    /// File system errors outside the relational store
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The change tracker file could not be encoded or decoded
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Invalid or unreadable configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl RetrievalError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn corrupt_index<S: Into<String>>(path: &std::path::Path, reason: S) -> Self {
        Self::CorruptIndex {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Whether this error means a persisted file was simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
