//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the boundary to the persistent vector store.
//! Ingestion only ever appends through [`upsert`](VectorIndex::upsert); chat
//! only reads through [`query`](VectorIndex::query). No transactional
//! isolation is assumed between the two.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or replace entries by id |
//! | [`query`](VectorIndex::query) | Top-k nearest neighbours, best first |
//! | [`stats`](VectorIndex::stats) | Aggregate vector count and dimension |

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexEntry, IndexStats, ScoredChunk};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Configured index name, for logs and summaries.
    fn name(&self) -> &str;

    /// Write entries, returning how many were accepted.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize>;

    /// Return up to `top_k` entries ordered by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    async fn stats(&self) -> Result<IndexStats>;
}
