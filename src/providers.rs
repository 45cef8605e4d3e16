//! Gateway construction from [`Config`].

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use mishkat_core::embedding::Embedder;
use mishkat_core::index::VectorIndex;
use mishkat_core::llm::LanguageModel;

use crate::config::Config;
use crate::embedding::OpenAIEmbedder;
use crate::llm::OpenAIChat;
use crate::local_index::FileIndex;
use crate::pinecone::PineconeIndex;

pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder = OpenAIEmbedder::new(&config.embedding).context("Cannot create embedder")?;
    Ok(Arc::new(embedder))
}

/// Embedder for the chat path: one request per query, no retries.
pub fn build_query_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let mut embedding = config.embedding.clone();
    embedding.max_retries = 0;
    let embedder = OpenAIEmbedder::new(&embedding).context("Cannot create embedder")?;
    Ok(Arc::new(embedder))
}

pub fn build_llm(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let llm = OpenAIChat::new(&config.llm).context("Cannot create LLM client")?;
    Ok(Arc::new(llm))
}

pub async fn build_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "pinecone" => {
            let index = PineconeIndex::connect(&config.index)
                .await
                .context("Cannot connect to Pinecone index")?;
            Ok(Arc::new(index))
        }
        "local" => {
            let path = config
                .index
                .path
                .as_ref()
                .context("index.path is required for the local provider")?;
            let name = config.index.name.clone().unwrap_or_else(|| "local".to_string());
            let index = FileIndex::open(name, path)
                .await
                .with_context(|| format!("Cannot open local index {}", path.display()))?;
            Ok(Arc::new(index))
        }
        other => bail!("Unknown index provider: '{}'", other),
    }
}
