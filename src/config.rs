//! TOML configuration.
//!
//! One file describes every service the app talks to. The loaded [`Config`]
//! is passed explicitly to each constructor; the only environment lookups
//! happen here, when `api_key_env` names are resolved at load time.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use mishkat_core::chunk::ChunkSpec;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_pinecone_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: None,
            host: None,
            api_key: None,
            api_key_env: default_pinecone_key_env(),
            namespace: String::new(),
            path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "pinecone".to_string()
}
fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_openai_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub condense_temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            condense_temperature: 0.0,
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_openai_key_env(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn spec(&self) -> Result<ChunkSpec> {
        Ok(ChunkSpec::new(self.chunk_size, self.chunk_overlap)?)
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            include_globs: default_include_globs(),
            batch_size: default_ingest_batch_size(),
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("new_data")]
}
fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}
fn default_ingest_batch_size() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_context_budget")]
    pub context_budget_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_budget_tokens: default_context_budget(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_context_budget() -> usize {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

/// Return the configured key, or explain which variable is missing.
fn require_key(section: &str, key: &Option<String>, env: &str) -> Result<String> {
    match key {
        Some(k) if !k.trim().is_empty() => Ok(k.clone()),
        _ => bail!(
            "{} API key not set: add api_key to [{}] or export {}",
            section,
            section,
            env
        ),
    }
}

impl IndexConfig {
    pub fn require_api_key(&self) -> Result<String> {
        require_key("index", &self.api_key, &self.api_key_env)
    }
}

impl EmbeddingConfig {
    pub fn require_api_key(&self) -> Result<String> {
        require_key("embedding", &self.api_key, &self.api_key_env)
    }
}

impl LlmConfig {
    pub fn require_api_key(&self) -> Result<String> {
        require_key("llm", &self.api_key, &self.api_key_env)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Parse, resolve API keys from the environment, and validate.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    resolve_env(&mut config.index.api_key, &config.index.api_key_env);
    resolve_env(&mut config.embedding.api_key, &config.embedding.api_key_env);
    resolve_env(&mut config.llm.api_key, &config.llm.api_key_env);

    validate(&config)?;
    Ok(config)
}

fn resolve_env(key: &mut Option<String>, env: &str) {
    if key.is_none() && !env.is_empty() {
        *key = std::env::var(env).ok().filter(|v| !v.trim().is_empty());
    }
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    config
        .chunking
        .spec()
        .context("Invalid [chunking] settings")?;

    // Ingest
    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be >= 1");
    }
    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must not be empty");
    }

    // Retrieval
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.context_budget_tokens == 0 {
        bail!("retrieval.context_budget_tokens must be >= 1");
    }

    // Embedding
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }

    // LLM
    for (name, t) in [
        ("llm.temperature", config.llm.temperature),
        ("llm.condense_temperature", config.llm.condense_temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            bail!("{} must be in [0.0, 2.0], got {}", name, t);
        }
    }

    // Index
    match config.index.provider.as_str() {
        "pinecone" => {
            if config.index.name.as_deref().map_or(true, str::is_empty) {
                bail!("index.name is required when provider is 'pinecone'");
            }
        }
        "local" => {
            if config.index.path.is_none() {
                bail!("index.path is required when provider is 'local'");
            }
        }
        other => bail!(
            "Unknown index provider: '{}'. Must be pinecone or local.",
            other
        ),
    }

    Ok(())
}
