//! In-memory [`VectorIndex`] implementation for local runs and tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Query is
//! brute-force cosine similarity over all stored vectors. The first upsert
//! fixes the index dimension; later vectors of another length are rejected.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{IndexEntry, IndexStats, ScoredChunk};

use super::VectorIndex;

/// In-memory vector index.
pub struct InMemoryIndex {
    name: String,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Build an index pre-populated with `entries` (e.g. from a snapshot).
    pub fn with_entries(name: impl Into<String>, entries: Vec<IndexEntry>) -> Result<Self> {
        let index = Self::new(name);
        index.insert_all(&entries)?;
        Ok(index)
    }

    /// Copy of all stored entries, in insertion order.
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_all(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut stored = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let expected = stored
            .first()
            .map(|e| e.values.len())
            .or_else(|| entries.first().map(|e| e.values.len()));

        if let Some(expected) = expected {
            if let Some(bad) = entries.iter().find(|e| e.values.len() != expected) {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: bad.values.len(),
                });
            }
        }

        for entry in entries {
            stored.retain(|e| e.id != entry.id);
            stored.push(entry.clone());
        }
        Ok(entries.len())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        self.insert_all(entries)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let stored = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if let Some(first) = stored.first() {
            if first.values.len() != vector.len() {
                return Err(RagError::DimensionMismatch {
                    expected: first.values.len(),
                    actual: vector.len(),
                });
            }
        }

        let mut matches: Vec<ScoredChunk> = stored
            .iter()
            .map(|e| ScoredChunk {
                id: e.id.clone(),
                score: cosine_similarity(vector, &e.values),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let stored = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(IndexStats {
            total_vector_count: stored.len() as u64,
            dimension: stored.first().map(|e| e.values.len()),
        })
    }
}
