//! Configuration for the chatbot backend

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "PMAY_RAG_CONFIG";

/// Most passages the reranker keeps for one answer
pub const MAX_RERANK_TOP_K: usize = 3;

/// Main backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Cross-encoder configuration
    pub reranker: RerankerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file (if given), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Override selected settings from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PMAY_RAG_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PMAY_RAG_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PMAY_RAG_PORT: {}", port),
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.llm.base_url = url.trim_end_matches('/').to_string();
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".into()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be non-zero".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".into(),
            ));
        }
        if self.reranker.top_k == 0 || self.reranker.top_k > MAX_RERANK_TOP_K {
            return Err(Error::Config(format!(
                "reranker.top_k must be between 1 and {}",
                MAX_RERANK_TOP_K
            )));
        }
        if self.retrieval.n_results == 0 {
            return Err(Error::Config("retrieval.n_results must be non-zero".into()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
    /// Capacity of the per-request event channel
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
            stream_buffer: 32,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Request timeout in seconds (embeddings and stream connect)
    pub timeout_secs: u64,
    /// Number of retries for failed embedding requests
    pub max_retries: u32,
    /// GPUs offered to the model
    pub num_gpu: u32,
    /// CPU threads offered to the model
    pub num_thread: u32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature (model default when unset)
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.2:1b".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            num_gpu: 1,
            num_thread: 4,
            max_tokens: 1000,
            temperature: None,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text:latest".to_string(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest neighbours requested from the index per question
    pub n_results: usize,
    /// Characters of chunk text kept in a source preview
    pub source_preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: 20,
            source_preview_chars: 200,
        }
    }
}

/// Cross-encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Hugging Face model id
    pub model: String,
    /// Directory the model is persisted to
    pub cache_dir: PathBuf,
    /// Passages kept after reranking
    pub top_k: usize,
    /// Maximum tokens per (query, passage) pair
    pub max_length: usize,
    /// Score reported when scoring fails and the first passage is used
    pub fallback_score: f32,
    /// ONNX intra-op threads (default: CPU count, max 4)
    pub intra_threads: Option<usize>,
    /// Load the model at startup instead of on first question
    pub preload: bool,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            cache_dir: PathBuf::from("models"),
            top_k: 3,
            max_length: 512,
            fallback_score: 0.5,
            intra_threads: None,
            preload: false,
        }
    }
}

impl RerankerConfig {
    /// Directory holding this model's files
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.model.replace('/', "_"))
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Storage path for the vector database
    pub storage_path: PathBuf,
    /// Collection (table) name
    pub collection: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./demo-rag-index/chunks.redb"),
            collection: "rag_app".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.n_results, 20);
        assert_eq!(config.reranker.top_k, 3);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [llm]
            generate_model = "llama3.2:3b"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.generate_model, "llama3.2:3b");
        assert_eq!(config.chunking.chunk_size, 1500);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rerank_top_k_is_capped() {
        let mut config = RagConfig::default();
        config.reranker.top_k = MAX_RERANK_TOP_K + 2;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.reranker.top_k = MAX_RERANK_TOP_K;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_dir_flattens_model_id() {
        let config = RerankerConfig::default();
        assert_eq!(
            config.model_dir(),
            PathBuf::from("models").join("cross-encoder_ms-marco-MiniLM-L-6-v2")
        );
    }
}
