//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::hashing::HashingProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Trait for embedding providers that turn text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input text, in input order,
/// each of length [`dimension`](Self::dimension) and normalized to unit length so
/// that an inner product is a cosine similarity.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Perform one-time setup such as downloading and loading model files.
    ///
    /// Must be idempotent: calling it again after a successful initialization is a
    /// no-op. Providers with nothing to set up keep the default.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Generate embeddings for multiple texts
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate the embedding for a single text
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(EmbedError::CountMismatch {
                expected: 1,
                actual: vectors.len() + 1,
            }),
        }
    }

    /// Dimension of the vectors produced by this provider
    fn dimension(&self) -> usize;

    /// Name/identifier of this provider
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    async fn initialize(&self) -> Result<()> {
        (**self).initialize().await
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).encode(texts).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the provider selected by `config`.
///
/// `model_name = "hashing"` selects the offline [`HashingProvider`]; any other
/// name is resolved against the fastembed model catalogue. The returned provider
/// is not yet initialized.
pub fn provider_from_config(config: &EmbedConfig) -> Result<Box<dyn EmbeddingProvider>> {
    if config.is_hashing_model() {
        Ok(Box::new(HashingProvider::new(config.hashing_dimension)?))
    } else {
        Ok(Box::new(FastEmbedProvider::new(config.clone())?))
    }
}

/// Encode `texts` in consecutive batches of at most `batch_size`, preserving order.
pub async fn embed_in_batches<P>(
    provider: &P,
    texts: &[String],
    batch_size: NonZeroUsize,
) -> Result<Vec<Vec<f32>>>
where
    P: EmbeddingProvider + ?Sized,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.get()) {
        let encoded = provider.encode(batch).await?;
        if encoded.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: encoded.len(),
            });
        }
        vectors.extend(encoded);
    }
    Ok(vectors)
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// fastembed-based embedding provider using ONNX models
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model_kind: EmbeddingModel,
    dimension: usize,
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.initialized())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates an uninitialized provider, resolving the model name against the
    /// fastembed catalogue. No files are downloaded until [`initialize`] runs.
    ///
    /// [`initialize`]: EmbeddingProvider::initialize
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let (model_kind, dimension) = resolve_model(config.model_name())?;
        Ok(Self {
            config,
            model_kind,
            dimension,
            model: OnceCell::new(),
        })
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let provider = Self::new(config)?;
        provider.initialize().await?;
        Ok(provider)
    }

    async fn load(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
        tracing::info!(
            "Loading embedding model {} into {}",
            self.config.model_name(),
            self.config.cache_dir.display()
        );

        tokio::fs::create_dir_all(&self.config.cache_dir).await?;

        let options = InitOptions::new(self.model_kind.clone())
            .with_cache_dir(self.config.cache_dir.clone())
            .with_show_download_progress(self.config.show_download_progress);

        let expected = self.dimension;
        let model = tokio::task::spawn_blocking(move || -> Result<TextEmbedding> {
            let mut model = TextEmbedding::try_new(options).map_err(EmbedError::model_init)?;

            let sample = model
                .embed(vec!["validation test".to_string()], None)
                .map_err(EmbedError::model_init)?;
            validate_sample(&sample, expected)?;
            Ok(model)
        })
        .await??;

        tracing::info!(
            "Model {} loaded. Dimension: {}",
            self.config.model_name(),
            self.dimension
        );
        Ok(Arc::new(Mutex::new(model)))
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn initialize(&self) -> Result<()> {
        self.model.get_or_try_init(|| self.load()).await?;
        Ok(())
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.get().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;
        let model = Arc::clone(model);
        let batch = texts.to_vec();
        let expected = batch.len();

        tracing::debug!("Generating embeddings for {} texts", expected);

        let mut vectors = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut guard = model
                .lock()
                .map_err(|_| EmbedError::invalid_config("embedding model lock poisoned"))?;
            guard.embed(batch, None).map_err(EmbedError::embedding_gen)
        })
        .await??;

        if vectors.len() != expected {
            return Err(EmbedError::CountMismatch {
                expected,
                actual: vectors.len(),
            });
        }
        for vector in &mut vectors {
            l2_normalize(vector);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "fastembed"
    }
}

/// Find a fastembed model by its model code (`Qdrant/all-MiniLM-L6-v2-onnx`) or by
/// the short name after the organisation prefix, ignoring case and an `-onnx` suffix.
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let wanted = name.trim().to_ascii_lowercase();
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            let code = info.model_code.to_ascii_lowercase();
            let short = code.rsplit('/').next().unwrap_or(code.as_str());
            code == wanted || short == wanted || short.trim_end_matches("-onnx") == wanted
        })
        .map(|info| (info.model, info.dim))
        .ok_or_else(|| EmbedError::UnknownModel {
            name: name.to_string(),
        })
}

fn validate_sample(sample: &[Vec<f32>], expected_dimension: usize) -> Result<()> {
    let embedding = sample.first().ok_or_else(|| {
        EmbedError::invalid_config("Model validation failed: no embeddings generated")
    })?;

    if embedding.len() != expected_dimension {
        return Err(EmbedError::invalid_config(format!(
            "Model validation failed: expected dimension {}, got {}",
            expected_dimension,
            embedding.len()
        )));
    }

    if embedding.iter().any(|value| !value.is_finite()) {
        return Err(EmbedError::invalid_config(
            "Model validation failed: non-finite values in embedding",
        ));
    }
    Ok(())
}
