//! Pinecone data-plane client.
//!
//! The index must already exist. When `index.host` is not configured, the
//! data-plane host is looked up once through the control plane
//! (`GET https://api.pinecone.io/indexes/{name}`); a 404 there means the
//! index is missing and is reported as a connection failure.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | upsert | `POST /vectors/upsert` (slices of 100 vectors) |
//! | query | `POST /query` with `includeMetadata` |
//! | stats | `POST /describe_index_stats` |

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use mishkat_core::index::VectorIndex;
use mishkat_core::models::{IndexEntry, IndexStats, ScoredChunk};
use mishkat_core::{RagError, Result};

use crate::config::IndexConfig;
use crate::http;

const SERVICE: &str = "pinecone";
const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Maximum vectors per upsert request.
pub const UPSERT_SLICE: usize = 100;

pub struct PineconeIndex {
    client: reqwest::Client,
    name: String,
    host: String,
    api_key: String,
    namespace: String,
    timeout: Duration,
}

impl PineconeIndex {
    /// Connect to the configured index, resolving its host if needed.
    pub async fn connect(config: &IndexConfig) -> anyhow::Result<Self> {
        let name = config
            .name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("index.name is required for pinecone"))?;
        let api_key = config.require_api_key()?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = http::build_client(SERVICE, Some(timeout))?;

        let host = match &config.host {
            Some(h) => h.clone(),
            None => describe_host(&client, &name, &api_key, timeout).await?,
        };

        Ok(Self {
            client,
            name,
            host: normalize_host(&host),
            api_key,
            namespace: config.namespace.clone(),
            timeout,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.host, path);
        let response = http::send_with_retry(SERVICE, self.timeout, 0, || {
            self.client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(body)
        })
        .await?;
        http::read_json(SERVICE, response).await
    }
}

async fn describe_host(
    client: &reqwest::Client,
    name: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<String> {
    let url = format!("{}/indexes/{}", CONTROL_PLANE, name);
    let response = http::send_with_retry(SERVICE, timeout, 0, || {
        client
            .get(&url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    })
    .await
    .map_err(|e| match e {
        RagError::Service {
            status: Some(404), ..
        } => RagError::connection(SERVICE, format!("index '{}' does not exist", name)),
        other => other,
    })?;

    let json = http::read_json(SERVICE, response).await?;
    json.get("host")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RagError::service(SERVICE, None, "index description has no host"))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Pinecone metadata values must be flat; the text travels in `text`.
fn upsert_body(entries: &[IndexEntry], namespace: &str) -> Value {
    let vectors: Vec<Value> = entries
        .iter()
        .map(|e| {
            let mut metadata = e.metadata.clone();
            metadata.insert("text".to_string(), Value::String(e.text.clone()));
            json!({
                "id": e.id,
                "values": e.values,
                "metadata": metadata,
            })
        })
        .collect();
    json!({ "vectors": vectors, "namespace": namespace })
}

fn parse_upserted(json: &Value) -> Result<usize> {
    json.get("upsertedCount")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| RagError::service(SERVICE, None, "upsert response has no upsertedCount"))
}

/// Parse `/query` matches, recovering chunk text from metadata.
///
/// Text is read from `metadata.text`, or from the `text` field of a JSON
/// `_node_content` payload written by other ingestion tools.
fn parse_matches(json: &Value) -> Result<Vec<ScoredChunk>> {
    let matches = json
        .get("matches")
        .and_then(Value::as_array)
        .ok_or_else(|| RagError::service(SERVICE, None, "query response has no matches"))?;

    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        let id = m
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RagError::service(SERVICE, None, "match has no id"))?;
        let score = m.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
        let mut metadata: Map<String, Value> = m
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let text = match metadata.remove("text") {
            Some(Value::String(t)) => t,
            _ => node_content_text(&metadata).unwrap_or_default(),
        };
        out.push(ScoredChunk {
            id: id.to_string(),
            score,
            text,
            metadata,
        });
    }
    Ok(out)
}

fn node_content_text(metadata: &Map<String, Value>) -> Option<String> {
    let raw = metadata.get("_node_content")?.as_str()?;
    let node: Value = serde_json::from_str(raw).ok()?;
    node.get("text")?.as_str().map(str::to_string)
}

fn parse_stats(json: &Value) -> IndexStats {
    IndexStats {
        total_vector_count: json
            .get("totalVectorCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        dimension: json
            .get("dimension")
            .and_then(Value::as_u64)
            .map(|d| d as usize),
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut total = 0;
        for slice in entries.chunks(UPSERT_SLICE) {
            let json = self.post("/vectors/upsert", &upsert_body(slice, &self.namespace)).await?;
            total += parse_upserted(&json)?;
        }
        Ok(total)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
            "namespace": self.namespace,
        });
        let json = self.post("/query", &body).await?;
        parse_matches(&json)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let json = self.post("/describe_index_stats", &json!({})).await?;
        Ok(parse_stats(&json))
    }
}
