//! # sift-embed
//!
//! Text embedding providers for the sift retrieval pipeline. Everything the
//! retriever needs from an embedding model is captured by the
//! [`EmbeddingProvider`] trait: an explicit, idempotent `initialize` step and an
//! order-preserving `encode` that returns unit-norm `f32` vectors of a fixed
//! dimension.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX sentence-transformer models via fastembed,
//!   downloaded into a configurable cache directory on first initialization
//! - [`HashingProvider`]: deterministic feature hashing, no model files needed
//!
//! ## Quick Start
//!
//! ```no_run
//! use sift_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let vectors = provider.encode(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          vectors.len(), provider.dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{DEFAULT_MODEL_NAME, EmbedConfig, HASHING_MODEL_NAME};
pub use error::{EmbedError, Result};
pub use hashing::HashingProvider;
pub use provider::{
    EmbeddingProvider, FastEmbedProvider, embed_in_batches, l2_normalize, provider_from_config,
};
