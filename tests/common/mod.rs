//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};

use mishkat::chat::{ChatEngine, ChatSettings};
use mishkat_core::embedding::Embedder;
use mishkat_core::index::memory::InMemoryIndex;
use mishkat_core::index::VectorIndex;
use mishkat_core::language::{LanguageClassifier, LanguageDetector};
use mishkat_core::llm::{CompletionRequest, FragmentStream, LanguageModel};
use mishkat_core::models::{IndexEntry, IndexStats, ScoredChunk};
use mishkat_core::{RagError, Result};

pub const DIMS: usize = 32;

/// Deterministic embedder: a normalised histogram of code points mod 32.
///
/// Texts containing `poison` fail the whole call.
#[derive(Default)]
pub struct LetterEmbedder {
    pub calls: AtomicUsize,
}

pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        v[(c as u32 as usize) % DIMS] += 1.0;
    }
    v[DIMS - 1] += 1.0;
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t.contains("poison")) {
            return Err(RagError::service("embedding", Some(500), "poisoned input"));
        }
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }
}

/// Index whose every call fails as if the service were unreachable.
pub struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    fn name(&self) -> &str {
        "down"
    }

    async fn upsert(&self, _entries: &[IndexEntry]) -> Result<usize> {
        Err(RagError::connection("pinecone", "connection refused"))
    }

    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<ScoredChunk>> {
        Err(RagError::connection("pinecone", "connection refused"))
    }

    async fn stats(&self) -> Result<IndexStats> {
        Err(RagError::connection("pinecone", "connection refused"))
    }
}

/// In-memory index pre-filled with `(filename, text)` pairs.
pub fn seeded_index(docs: &[(&str, &str)]) -> Arc<InMemoryIndex> {
    let entries = docs
        .iter()
        .enumerate()
        .map(|(i, (filename, text))| {
            let mut metadata = Map::new();
            metadata.insert("filename".into(), Value::String(filename.to_string()));
            IndexEntry {
                id: format!("seed-{}", i),
                values: letter_vector(text),
                text: text.to_string(),
                metadata,
            }
        })
        .collect();
    Arc::new(InMemoryIndex::with_entries("test", entries).unwrap())
}

/// Sets its flag when dropped.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// Finish normally after the fragments.
    Done,
    /// Fail with `StreamInterrupted` after the fragments.
    Interrupted,
    /// Never finish after the fragments.
    Hang,
}

/// Language model that replays fixed fragments and records every request.
pub struct ScriptedLlm {
    pub fragments: Vec<String>,
    pub condensed: String,
    pub end: StreamEnd,
    pub fail_complete: bool,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub upstream_dropped: Arc<AtomicBool>,
}

impl ScriptedLlm {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            condensed: "standalone question".to_string(),
            end: StreamEnd::Done,
            fail_complete: false,
            requests: Mutex::new(Vec::new()),
            upstream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_condensed(mut self, condensed: &str) -> Self {
        self.condensed = condensed.to_string();
        self
    }

    pub fn ending(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn is_condense(request: &CompletionRequest) -> bool {
        request
            .messages
            .first()
            .map(|m| m.content.contains("<Standalone question>"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_complete {
            return Err(RagError::connection("llm", "connection refused"));
        }
        if Self::is_condense(request) {
            return Ok(self.condensed.clone());
        }
        Ok(self.fragments.concat())
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        let guard = DropFlag(self.upstream_dropped.clone());
        let body = stream::iter(self.fragments.clone().into_iter().map(Ok));
        let tail: FragmentStream = match self.end {
            StreamEnd::Done => Box::pin(stream::empty()),
            StreamEnd::Interrupted => Box::pin(stream::once(async {
                Err(RagError::StreamInterrupted("connection reset".to_string()))
            })),
            StreamEnd::Hang => Box::pin(stream::pending()),
        };
        Ok(Box::pin(body.chain(tail).map(move |item| {
            let _keep = &guard;
            item
        })))
    }
}

/// Detector that always names the same language.
pub struct FixedDetector(pub &'static str);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

pub fn settings() -> ChatSettings {
    ChatSettings {
        top_k: 2,
        context_budget_tokens: 1000,
        temperature: 0.7,
        condense_temperature: 0.0,
    }
}

pub fn engine(index: Arc<dyn VectorIndex>, llm: Arc<ScriptedLlm>) -> ChatEngine {
    ChatEngine::new(Arc::new(LetterEmbedder::default()), index, llm, settings())
}

pub fn engine_with_detector(
    index: Arc<dyn VectorIndex>,
    llm: Arc<ScriptedLlm>,
    detector: &'static str,
) -> ChatEngine {
    engine(index, llm).with_classifier(LanguageClassifier::new(Box::new(FixedDetector(detector))))
}
