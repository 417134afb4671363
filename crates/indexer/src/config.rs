use crate::error::{IndexerError, Result};
use devagent_code_chunker::{ChunkerConfig, ANALYZER_EXTENSIONS, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use devagent_vector_store::paths::{config_path_for_project_root, default_persist_dir};
use devagent_vector_store::{
    EmbeddingProvider, HashingEmbedder, OllamaEmbedder, DEFAULT_DIMENSION,
    DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*.pyc",
    "__pycache__",
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "*.egg-info",
    "dist",
    "build",
    ".pytest_cache",
    ".coverage",
    "*.log",
    "*.tmp",
    ".DS_Store",
    "Thumbs.db",
    ".devagent",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// Project configuration, read from `.devagent/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevAgentConfig {
    /// Where the index and hash manifest live; relative paths resolve against the project
    pub persist_directory: Option<PathBuf>,
    pub indexing: IndexingConfig,
    pub embedding: EmbeddingConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Globs matched against both the relative path and the file name
    pub exclude_patterns: Vec<String>,
    /// Extensions with the leading dot, e.g. `.py`
    pub supported_extensions: Vec<String>,
    pub respect_gitignore: bool,
    pub max_file_size_bytes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            supported_extensions: ANALYZER_EXTENSIONS.iter().map(ToString::to_string).collect(),
            respect_gitignore: false,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Model name for networked providers
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl EmbeddingConfig {
    /// Construct the configured provider
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(self.dimension)?),
            EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(
                self.endpoint.clone(),
                self.model.clone(),
                self.dimension,
                Duration::from_secs(self.timeout_secs),
                self.max_retries,
            )?),
        };
        log::debug!(
            "Embedding provider {} ({} dimensions)",
            provider.model_id(),
            provider.dimension()
        );
        Ok(provider)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Files indexed between index/manifest checkpoints during bulk runs
    pub index_batch_size: usize,
    pub retrieval_top_k: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            index_batch_size: 100,
            retrieval_top_k: 5,
        }
    }
}

impl DevAgentConfig {
    /// Load `explicit` if given, else `<project>/.devagent/config.toml` if present, else
    /// defaults. A missing default file is fine; a malformed one is an error.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = config_path_for_project_root(project_root);
                if !path.exists() {
                    log::debug!("No config at {}; using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = std::fs::read_to_string(&path).map_err(|e| {
            IndexerError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| IndexerError::config(format!("{}: {e}", path.display())))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| IndexerError::config(format!("Invalid config format: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker_config().validate()?;
        if self.performance.index_batch_size == 0 {
            return Err(IndexerError::config("performance.index_batch_size must be positive"));
        }
        if self.embedding.dimension == 0 {
            return Err(IndexerError::config("embedding.dimension must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::new(self.indexing.chunk_size, self.indexing.overlap)
    }

    #[must_use]
    pub fn persist_dir(&self, project_root: &Path) -> PathBuf {
        match &self.persist_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => default_persist_dir(project_root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = DevAgentConfig::default();
        assert_eq!(config.indexing.chunk_size, 1000);
        assert_eq!(config.indexing.overlap, 100);
        assert!(config.indexing.exclude_patterns.contains(&"node_modules".to_string()));
        assert!(config.indexing.supported_extensions.contains(&".py".to_string()));
        assert_eq!(config.performance.index_batch_size, 100);
        assert_eq!(config.performance.retrieval_top_k, 5);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashing);
        assert_eq!(
            config.persist_dir(Path::new("/p")),
            Path::new("/p/.devagent/index")
        );
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = DevAgentConfig::from_toml_str(
            r#"
persist_directory = "state"

[indexing]
chunk_size = 400
overlap = 40

[embedding]
provider = "ollama"
model = "all-minilm"
"#,
        )
        .unwrap();
        assert_eq!(config.indexing.chunk_size, 400);
        assert_eq!(config.indexing.max_file_size_bytes, 1_048_576);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.persist_dir(Path::new("/p")), Path::new("/p/state"));
    }

    #[test]
    fn invalid_windowing_is_rejected() {
        let err = DevAgentConfig::from_toml_str("[indexing]\nchunk_size = 50\noverlap = 50\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"), "{err}");
    }

    #[test]
    fn load_lookup_order() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            DevAgentConfig::load(tmp.path(), None).unwrap(),
            DevAgentConfig::default()
        );

        let dir = tmp.path().join(".devagent");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[performance]\nretrieval_top_k = 9\n").unwrap();
        assert_eq!(
            DevAgentConfig::load(tmp.path(), None)
                .unwrap()
                .performance
                .retrieval_top_k,
            9
        );

        let explicit = tmp.path().join("other.toml");
        std::fs::write(&explicit, "[performance]\nretrieval_top_k = 2\n").unwrap();
        assert_eq!(
            DevAgentConfig::load(tmp.path(), Some(&explicit))
                .unwrap()
                .performance
                .retrieval_top_k,
            2
        );

        std::fs::write(dir.join("config.toml"), "[performance\n").unwrap();
        assert!(DevAgentConfig::load(tmp.path(), None).is_err());
        assert!(DevAgentConfig::load(tmp.path(), Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn hashing_provider_follows_dimension() {
        let config = EmbeddingConfig {
            dimension: 48,
            ..EmbeddingConfig::default()
        };
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.dimension(), 48);
        assert_eq!(provider.embed("x").unwrap().len(), 48);
    }
}
