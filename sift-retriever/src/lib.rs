//! sift-retriever: semantic retrieval over a directory of text documents
//!
//! This crate ingests a directory of documents, splits each one into sentence
//! groups, embeds every chunk, and answers natural-language queries with the most
//! similar chunks. Re-ingesting a directory only processes files whose
//! modification time changed, and the vector index can be rebuilt from storage at
//! any time.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Engine, chunker, change tracker and vector index
//! - **[`storage`]**: Document store abstraction with SQLite implementation
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sift_retriever::{config::RetrievalConfig, retrieval::engine::RetrievalEngine};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RetrievalConfig::default();
//! let provider = sift_embed::provider_from_config(&config.embed_config())?;
//! let engine = RetrievalEngine::open(config, provider).await?;
//!
//! engine.ingest("documents").await?;
//! println!("{}", engine.generate_response("What is machine learning?", 3).await?);
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → ChangeTracker → Chunker → EmbeddingProvider → SqliteStore
//!                                          ↓                ↓
//!                  Queries → RetrievalEngine ← VectorIndex (rebuild)
//! ```

pub mod config;
pub mod error;
pub mod persist;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrievalError};
