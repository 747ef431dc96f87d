//! Offline embedding provider based on feature hashing.
//!
//! Every lowercase alphanumeric token of the input is hashed with FNV-1a into one
//! of `dimension` buckets; the top bit of the hash picks the sign of the
//! contribution so that collisions tend to cancel rather than accumulate. The
//! resulting bag-of-words vector is L2-normalized.
//!
//! This captures lexical overlap only, not meaning, but it is deterministic,
//! instantaneous and needs no model files, which makes it the provider of choice
//! for tests and for air-gapped smoke runs.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, l2_normalize};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Deterministic bag-of-words embedding provider
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing dimension must be greater than zero",
            ));
        }
        Ok(Self { dimension })
    }

    /// Embed a single text synchronously.
    ///
    /// Text without any alphanumeric token maps to the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
