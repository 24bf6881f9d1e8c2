//! Configuration for the RAG system
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Backend provider for embeddings and generation
    pub backend: BackendProvider,
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Processing configuration
    pub processing: ProcessingConfig,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// OpenAI embeddings and chat completions
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl std::str::FromStr for BackendProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Config(format!("Unknown backend: {}", other))),
        }
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
    /// Origin allowed by CORS (the web frontend)
    pub allowed_origin: String,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
    /// Directory where uploaded PDFs are kept
    pub upload_folder: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origin: "http://localhost:3000".to_string(),
            max_upload_size: 50 * 1024 * 1024,
            upload_folder: PathBuf::from("uploads"),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions (1536 for text-embedding-ada-002, 768 for nomic-embed-text)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimensions: 1536 }
    }
}

/// Text chunking configuration, in whitespace-delimited words
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk
    pub chunk_size: usize,
    /// Words shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// LLM configuration, shared by embedding and generation calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// API key (OpenAI only)
    pub api_key: Option<String>,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Response token budget
    pub max_tokens: usize,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::openai()
    }
}

impl LlmConfig {
    /// Defaults for the OpenAI API
    pub fn openai() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embed_model: "text-embedding-ada-002".to_string(),
            generate_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 60,
            max_retries: 2,
        }
    }

    /// Defaults for a local Ollama server
    pub fn ollama() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "phi3".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 120,
            max_retries: 2,
        }
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Storage path for the SQLite file
    pub storage_path: PathBuf,
    /// Named collection holding the chunks
    pub collection: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdf-rag")
            .join("vectors.db");

        Self {
            storage_path,
            collection: "pdf_chunks".to_string(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of neighbours fed to the language model
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Concurrent embedding calls per document (default: CPU count, max 8)
    pub parallel_embeddings: Option<usize>,
    /// Timeout for a single embedding call, retries included
    pub embed_timeout_secs: u64,
    /// Timeout for a single answer synthesis call, retries included
    pub synthesis_timeout_secs: u64,
    /// Timeout for ingesting one document end to end
    pub document_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_embeddings: None,
            embed_timeout_secs: 30,
            synthesis_timeout_secs: 120,
            document_timeout_secs: 600,
        }
    }
}

impl ProcessingConfig {
    /// Resolved embedding concurrency
    pub fn embedding_workers(&self) -> usize {
        self.parallel_embeddings
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

impl RagConfig {
    /// Defaults for the given backend
    pub fn for_backend(backend: BackendProvider) -> Self {
        let mut config = Self {
            backend,
            ..Self::default()
        };
        if backend == BackendProvider::Ollama {
            config.llm = LlmConfig::ollama();
            config.embeddings.dimensions = 768;
        }
        config
    }

    /// Load configuration: defaults, then the TOML file (if given), then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parse TOML configuration text
    ///
    /// Sections the file leaves out take the defaults of its chosen backend.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let invalid = |e: toml::de::Error| Error::Config(format!("Invalid config file: {}", e));
        let table: toml::Table = toml::from_str(raw).map_err(invalid)?;
        let mut config: Self = toml::from_str(raw).map_err(invalid)?;

        let defaults = Self::for_backend(config.backend);
        if !table.contains_key("llm") {
            config.llm = defaults.llm;
        }
        if !table.contains_key("embeddings") {
            config.embeddings = defaults.embeddings;
        }
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("RAG_BACKEND") {
            let backend: BackendProvider = backend.parse()?;
            if backend != self.backend {
                let defaults = Self::for_backend(backend);
                self.backend = backend;
                self.llm = defaults.llm;
                self.embeddings = defaults.embeddings;
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            if self.backend == BackendProvider::Ollama {
                self.llm.base_url = url;
            }
        }
        if let Some(path) = lookup("RAG_DB_PATH") {
            self.vector_db.storage_path = PathBuf::from(path);
        }
        if let Some(folder) = lookup("UPLOAD_FOLDER") {
            self.server.upload_folder = PathBuf::from(folder);
        }
        if let Some(host) = lookup("RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RAG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid RAG_PORT: {}", port)))?;
        }
        Ok(())
    }

    /// Fail fast on settings that can never work
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be positive".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be positive".to_string()));
        }
        if self.backend == BackendProvider::OpenAi
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::Config("OpenAI API key not configured".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.backend, BackendProvider::OpenAi);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.vector_db.collection, "pdf_chunks");
    }

    #[test]
    fn test_partial_toml() {
        let config = RagConfig::from_toml(
            r#"
            backend = "ollama"

            [chunking]
            chunk_size = 200
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendProvider::Ollama);
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.llm.generate_model, LlmConfig::ollama().generate_model);
        assert_eq!(config.embeddings.dimensions, 768);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RagConfig::default();
        config
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("RAG_DB_PATH", "/tmp/x.db"),
                ("RAG_PORT", "9001"),
            ]))
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.vector_db.storage_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.server.port, 9001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_switch_resets_models() {
        let mut config = RagConfig::default();
        config
            .apply_env(env(&[("RAG_BACKEND", "ollama"), ("OLLAMA_URL", "http://gpu:11434")]))
            .unwrap();
        assert_eq!(config.backend, BackendProvider::Ollama);
        assert_eq!(config.llm.embed_model, "nomic-embed-text");
        assert_eq!(config.llm.base_url, "http://gpu:11434");
        assert_eq!(config.embeddings.dimensions, 768);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = RagConfig::for_backend(BackendProvider::Ollama);
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = RagConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = RagConfig::for_backend(BackendProvider::Ollama);
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());

        assert!(RagConfig::default()
            .apply_env(env(&[("RAG_PORT", "nope")]))
            .is_err());
    }
}
