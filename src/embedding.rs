//! OpenAI-compatible embeddings client.
//!
//! Calls `POST {base_url}/embeddings` with sub-batches of
//! `embedding.batch_size` texts. HTTP 429 and 5xx are retried with
//! exponential backoff up to `embedding.max_retries` times; every other
//! failure is returned immediately.

use std::time::Duration;

use async_trait::async_trait;

use mishkat_core::embedding::Embedder;
use mishkat_core::{RagError, Result};

use crate::config::EmbeddingConfig;
use crate::http;

const SERVICE: &str = "embedding";

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = config.require_api_key()?;
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: http::build_client(SERVICE, Some(timeout))?,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            timeout,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = http::send_with_retry(SERVICE, self.timeout, self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let json = http::read_json(SERVICE, response).await?;
        let vectors = parse_openai_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(RagError::service(
                SERVICE,
                None,
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        for v in &vectors {
            if v.len() != self.dims {
                return Err(RagError::DimensionMismatch {
                    expected: self.dims,
                    actual: v.len(),
                });
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        tracing::debug!(texts = texts.len(), model = %self.model, "embedded texts");
        Ok(out)
    }
}

/// Parse an embeddings response into vectors ordered by their `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let invalid = |what: &str| RagError::service(SERVICE, None, format!("invalid response: {}", what));

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid("missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_orders_by_index() {
        let body = json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.5, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        });
        let vectors = parse_openai_response(&body).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn missing_data_is_service_error() {
        let err = parse_openai_response(&json!({"error": "nope"})).unwrap_err();
        assert_eq!(err.kind(), "service_error");
    }

    #[test]
    fn missing_embedding_is_service_error() {
        let err = parse_openai_response(&json!({"data": [{"index": 0}]})).unwrap_err();
        assert!(err.to_string().contains("missing embedding"));
    }

    #[test]
    fn new_requires_api_key() {
        let config = EmbeddingConfig {
            api_key: None,
            api_key_env: "MISHKAT_TEST_UNSET_EMBED_KEY".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(OpenAIEmbedder::new(&config).is_err());

        let config = EmbeddingConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:8080/v1/".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAIEmbedder::new(&config).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.dims(), 1536);
    }
}
