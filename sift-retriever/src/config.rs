//! Configuration for the retrieval engine.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```toml
//! model_name = "all-MiniLM-L6-v2"
//! chunk_size = 5
//! batch_size = 32
//! documents_path = "documents"
//! db_path = ".sift/sift.db"
//! index_path = ".sift/index.bin"
//! processed_files_path = ".sift/processed_files.json"
//! extensions = ["txt"]
//! ```

use serde::{Deserialize, Serialize};
use sift_embed::{DEFAULT_MODEL_NAME, EmbedConfig};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{Result, RetrievalError};
use crate::retrieval::chunker::ChunkerConfig;

/// Configuration for [`RetrievalEngine`](crate::retrieval::engine::RetrievalEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Embedding model name, or "hashing" for the offline provider
    pub model_name: String,
    /// Directory where downloaded model files are cached
    pub model_cache_dir: PathBuf,
    /// Whether model downloads print progress
    pub show_download_progress: bool,
    /// Output dimension of the hashing provider
    pub hashing_dimension: usize,
    /// Sentences per chunk
    pub chunk_size: NonZeroUsize,
    /// Maximum number of chunks sent to the embedding provider at once
    pub batch_size: NonZeroUsize,
    /// Directory ingested by default
    pub documents_path: PathBuf,
    pub db_path: PathBuf,
    pub index_path: PathBuf,
    pub processed_files_path: PathBuf,
    /// File extensions selected for ingestion
    pub extensions: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let state_dir = PathBuf::from(".sift");
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_cache_dir: state_dir.join("models"),
            show_download_progress: true,
            hashing_dimension: 384,
            chunk_size: NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
            batch_size: NonZeroUsize::new(32).unwrap_or(NonZeroUsize::MIN),
            documents_path: PathBuf::from("documents"),
            db_path: state_dir.join("sift.db"),
            index_path: state_dir.join("index.bin"),
            processed_files_path: state_dir.join("processed_files.json"),
            extensions: vec!["txt".to_string()],
        }
    }
}

impl RetrievalConfig {
    /// Load a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
            .map_err(|e| RetrievalError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RetrievalError::config(e.to_string()))
    }

    /// Place the database, index, tracker and model cache under `dir`.
    pub fn with_state_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.db_path = dir.join("sift.db");
        self.index_path = dir.join("index.bin");
        self.processed_files_path = dir.join("processed_files.json");
        self.model_cache_dir = dir.join("models");
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_hashing_dimension(mut self, dimension: usize) -> Self {
        self.hashing_dimension = dimension;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_documents_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.documents_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Embedding settings for [`sift_embed::provider_from_config`].
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig {
            model_name: self.model_name.clone(),
            cache_dir: self.model_cache_dir.clone(),
            show_download_progress: self.show_download_progress,
            hashing_dimension: self.hashing_dimension,
        }
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::new(self.chunk_size).with_extensions(self.extensions.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.chunk_size.get(), 5);
        assert_eq!(config.batch_size.get(), 32);
        assert_eq!(config.extensions, vec!["txt"]);
        assert_eq!(config.index_path, PathBuf::from(".sift/index.bin"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() -> Result<()> {
        let config = RetrievalConfig::from_toml(
            r#"
            model_name = "hashing"
            chunk_size = 2
            extensions = ["txt", "md"]
            "#,
        )?;
        assert_eq!(config.chunk_size.get(), 2);
        assert_eq!(config.batch_size.get(), 32);
        assert!(config.embed_config().is_hashing_model());
        assert_eq!(config.chunker_config().extensions, vec!["txt", "md"]);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            RetrievalConfig::from_toml("batch_size = 0"),
            Err(RetrievalError::Config { .. })
        ));
        assert!(matches!(
            RetrievalConfig::from_toml("chunk_sise = 3"),
            Err(RetrievalError::Config { .. })
        ));
    }

    #[test]
    fn test_from_file_and_builders() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("sift.toml");
        std::fs::write(&path, "documents_path = \"corpus\"\n")?;

        let config = RetrievalConfig::from_file(&path)?.with_state_dir(temp_dir.path());
        assert_eq!(config.documents_path, PathBuf::from("corpus"));
        assert_eq!(config.db_path, temp_dir.path().join("sift.db"));
        assert_eq!(config.embed_config().cache_dir, temp_dir.path().join("models"));

        assert!(RetrievalConfig::from_file(&temp_dir.path().join("missing.toml")).is_err());
        Ok(())
    }
}
