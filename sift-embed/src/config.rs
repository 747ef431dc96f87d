//! Configuration for embedding models

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model name that selects the offline [`HashingProvider`](crate::HashingProvider).
pub const HASHING_MODEL_NAME: &str = "hashing";

/// Default sentence-transformer model, matching what fastembed ships as
/// `all-MiniLM-L6-v2`.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name or model code of the embedding model to use
    pub model_name: String,
    /// Directory where downloaded model files are cached
    pub cache_dir: PathBuf,
    /// Whether to print download progress when fetching model files
    pub show_download_progress: bool,
    /// Output dimension for the hashing provider (ignored by ONNX models)
    pub hashing_dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: PathBuf::from(".sift").join("models"),
            show_download_progress: true,
            hashing_dimension: 384,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the named model with default settings
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Configuration for the offline hashing provider
    pub fn hashing(dimension: usize) -> Self {
        Self {
            model_name: HASHING_MODEL_NAME.to_string(),
            hashing_dimension: dimension,
            ..Self::default()
        }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Set whether download progress is shown (builder style)
    pub fn with_download_progress(self, show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
            ..self
        }
    }

    /// Whether this configuration selects the offline hashing provider
    pub fn is_hashing_model(&self) -> bool {
        self.model_name.eq_ignore_ascii_case(HASHING_MODEL_NAME)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert!(config.show_download_progress);
        assert!(!config.is_hashing_model());
    }

    #[test]
    fn test_config_builder_methods() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new("BAAI/bge-small-en-v1.5")
            .with_cache_dir(temp_dir.path())
            .with_download_progress(false);

        assert_eq!(config.model_name(), "BAAI/bge-small-en-v1.5");
        assert_eq!(config.cache_dir, temp_dir.path());
        assert!(!config.show_download_progress);
    }

    #[test]
    fn test_hashing_config() {
        let config = EmbedConfig::hashing(64);
        assert!(config.is_hashing_model());
        assert_eq!(config.hashing_dimension, 64);
        assert!(EmbedConfig::new("HASHING").is_hashing_model());
    }
}
