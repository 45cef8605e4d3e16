//! File-backed vector index for offline use.
//!
//! Wraps the core [`InMemoryIndex`] and persists every entry to a JSON
//! snapshot after each upsert. Selected with `index.provider = "local"`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mishkat_core::index::memory::InMemoryIndex;
use mishkat_core::index::VectorIndex;
use mishkat_core::models::{IndexEntry, IndexStats, ScoredChunk};
use mishkat_core::{RagError, Result};

const SERVICE: &str = "local index";

#[derive(Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<IndexEntry>,
}

pub struct FileIndex {
    path: PathBuf,
    inner: InMemoryIndex,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileIndex {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub async fn open(name: impl Into<String>, path: &Path) -> Result<Self> {
        let entries = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    RagError::connection(
                        SERVICE,
                        format!("corrupt snapshot {}: {}", path.display(), e),
                    )
                })?;
                snapshot.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(RagError::connection(
                    SERVICE,
                    format!("cannot read {}: {}", path.display(), e),
                ))
            }
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened local index");
        Ok(Self {
            path: path.to_path_buf(),
            inner: InMemoryIndex::with_entries(name, entries)?,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = Snapshot {
            entries: self.inner.snapshot(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| RagError::service(SERVICE, None, e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RagError::service(SERVICE, None, e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| RagError::service(SERVICE, None, e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RagError::service(SERVICE, None, e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FileIndex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let n = self.inner.upsert(entries).await?;
        self.persist().await?;
        Ok(n)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        self.inner.query(vector, top_k).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.inner.stats().await
    }
}
