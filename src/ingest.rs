//! Ingestion pipeline orchestration.
//!
//! Moves files from the source directories into the vector index in
//! batches of `ingest.batch_size` documents:
//!
//! 1. Read index stats (a failure here aborts the run).
//! 2. Per batch: extract each file, skipping failures; skip the batch when
//!    nothing was extracted; chunk, embed, and upsert the rest. An embed or
//!    upsert failure fails the whole batch, which is logged, and the run
//!    continues with the next one.
//! 3. Read index stats again and report.
//!
//! Nothing is de-duplicated: ingesting the same file twice stores its
//! chunks twice.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use mishkat_core::chunk::{chunk_document, ChunkSpec};
use mishkat_core::embedding::Embedder;
use mishkat_core::index::VectorIndex;
use mishkat_core::models::{Chunk, Document, IndexEntry};
use mishkat_core::{RagError, Result};

use crate::config::Config;
use crate::connector_fs;
use crate::extract::extract_document;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress, ProgressMode};
use crate::providers;

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Documents per batch.
    pub batch_size: usize,
    pub chunk_spec: ChunkSpec,
    /// Texts per embedding call.
    pub embed_batch_size: usize,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            batch_size: config.ingest.batch_size.max(1),
            chunk_spec: config.chunking.spec()?,
            embed_batch_size: config.embedding.batch_size.max(1),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_found: usize,
    pub documents_ingested: usize,
    pub documents_failed: usize,
    pub batches_total: usize,
    pub batches_skipped: usize,
    pub batches_failed: usize,
    pub chunks_upserted: usize,
    pub vectors_before: u64,
    /// `None` when the closing stats call failed.
    pub vectors_after: Option<u64>,
}

/// What a dry run would ingest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub files_found: usize,
    pub documents_extracted: usize,
    pub documents_failed: usize,
    pub estimated_chunks: usize,
}

pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    settings: IngestSettings,
    progress: Box<dyn IngestProgressReporter>,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            settings,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn IngestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest `files` in order. Only a failure to read the initial index
    /// stats is returned as an error.
    pub async fn run(&self, files: &[PathBuf]) -> Result<IngestReport> {
        let before = self.index.stats().await?;
        tracing::info!(
            index = self.index.name(),
            vectors = before.total_vector_count,
            "index stats before ingestion"
        );

        let batches: Vec<&[PathBuf]> = files.chunks(self.settings.batch_size).collect();
        let mut report = IngestReport {
            files_found: files.len(),
            batches_total: batches.len(),
            vectors_before: before.total_vector_count,
            ..IngestReport::default()
        };

        for (i, batch) in batches.iter().enumerate() {
            let n = i + 1;
            self.progress.report(IngestProgressEvent::Batch {
                n: n as u64,
                total: batches.len() as u64,
                files: batch.len(),
            });

            let mut docs = Vec::with_capacity(batch.len());
            for path in batch.iter() {
                match extract_document(path).await {
                    Ok(doc) => docs.push(doc),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping document");
                        report.documents_failed += 1;
                    }
                }
            }

            if docs.is_empty() {
                tracing::warn!(batch = n, "no usable documents in batch, skipping");
                report.batches_skipped += 1;
                continue;
            }

            match self.ingest_documents(&docs).await {
                Ok(upserted) => {
                    report.documents_ingested += docs.len();
                    report.chunks_upserted += upserted;
                    tracing::info!(
                        batch = n,
                        total = batches.len(),
                        documents = docs.len(),
                        chunks = upserted,
                        "batch ingested"
                    );
                }
                Err(e) => {
                    let err = RagError::BatchIngestFailed {
                        batch: n,
                        source: Box::new(e),
                    };
                    tracing::error!(error = %err, documents = docs.len(), "batch failed, continuing");
                    report.batches_failed += 1;
                }
            }
        }

        report.vectors_after = match self.index.stats().await {
            Ok(after) => {
                tracing::info!(
                    index = self.index.name(),
                    vectors = after.total_vector_count,
                    "index stats after ingestion"
                );
                Some(after.total_vector_count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read index stats after ingestion");
                None
            }
        };

        Ok(report)
    }

    /// Chunk, embed, and upsert one batch of documents.
    async fn ingest_documents(&self, docs: &[Document]) -> Result<usize> {
        let chunks: Vec<(Chunk, &str)> = docs
            .iter()
            .flat_map(|doc| {
                chunk_document(doc, &self.settings.chunk_spec)
                    .into_iter()
                    .map(move |c| (c, doc.content_hash.as_str()))
            })
            .filter(|(c, _)| !c.text.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for group in chunks.chunks(self.settings.embed_batch_size) {
            let texts: Vec<String> = group.iter().map(|(c, _)| c.text.clone()).collect();
            let embedded = self.embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(RagError::InvalidInput(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|((chunk, content_hash), values)| to_entry(chunk, content_hash, values, &ingested_at))
            .collect();

        self.index.upsert(&entries).await
    }

    /// Extract and chunk without embedding or writing anything.
    pub async fn dry_run(files: &[PathBuf], spec: &ChunkSpec) -> DryRunReport {
        let mut report = DryRunReport {
            files_found: files.len(),
            ..DryRunReport::default()
        };
        for path in files {
            match extract_document(path).await {
                Ok(doc) => {
                    report.documents_extracted += 1;
                    report.estimated_chunks += chunk_document(&doc, spec)
                        .iter()
                        .filter(|c| !c.text.trim().is_empty())
                        .count();
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping document");
                    report.documents_failed += 1;
                }
            }
        }
        report
    }
}

/// Flatten a chunk and its source metadata into an index entry.
fn to_entry(chunk: Chunk, content_hash: &str, values: Vec<f32>, ingested_at: &str) -> IndexEntry {
    let mut metadata = Map::new();
    if let Some(source) = &chunk.metadata {
        metadata.insert("filename".into(), Value::String(source.filename.clone()));
        metadata.insert(
            "source_directory".into(),
            Value::String(source.source_directory.clone()),
        );
        metadata.insert("file_path".into(), Value::String(source.file_path.clone()));
    }
    metadata.insert("document_id".into(), Value::String(chunk.document_id.clone()));
    metadata.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    metadata.insert("chunk_hash".into(), Value::String(chunk.hash.clone()));
    metadata.insert("chunk_id".into(), Value::String(chunk.id.clone()));
    metadata.insert("content_hash".into(), Value::String(content_hash.to_string()));
    metadata.insert("ingested_at".into(), Value::String(ingested_at.to_string()));

    IndexEntry {
        id: Uuid::new_v4().to_string(),
        values,
        text: chunk.text,
        metadata,
    }
}

/// `mishkat ingest`: scan, ingest, and print a summary.
pub async fn run_ingest(
    config: &Config,
    dirs: Vec<PathBuf>,
    dry_run: bool,
    mode: ProgressMode,
) -> anyhow::Result<()> {
    let mut ingest_config = config.ingest.clone();
    if !dirs.is_empty() {
        ingest_config.directories = dirs;
    }

    let progress = mode.reporter();
    progress.report(IngestProgressEvent::Scanning {
        directories: ingest_config.directories.len(),
    });
    let files = connector_fs::collect_files(&ingest_config)?;

    let mut settings = IngestSettings::from_config(config)?;
    settings.batch_size = ingest_config.batch_size.max(1);

    if dry_run {
        let report = IngestionPipeline::dry_run(&files, &settings.chunk_spec).await;
        println!("ingest (dry-run)");
        println!("  files found: {}", report.files_found);
        println!("  documents extracted: {}", report.documents_extracted);
        println!("  documents failed: {}", report.documents_failed);
        println!("  estimated chunks: {}", report.estimated_chunks);
        return Ok(());
    }

    let embedder = providers::build_embedder(config)?;
    let index = providers::build_index(config).await?;
    let index_name = index.name().to_string();

    let pipeline = IngestionPipeline::new(embedder, index, settings).with_progress(progress);
    let report = pipeline
        .run(&files)
        .await
        .context("Ingestion aborted: could not read index stats")?;

    println!("ingest {}", index_name);
    println!("  files found: {}", report.files_found);
    println!(
        "  documents ingested: {} / {}",
        report.documents_ingested, report.files_found
    );
    println!("  documents failed: {}", report.documents_failed);
    println!(
        "  batches: {} (skipped {}, failed {})",
        report.batches_total, report.batches_skipped, report.batches_failed
    );
    println!("  chunks upserted: {}", report.chunks_upserted);
    println!("  vectors before: {}", report.vectors_before);
    match report.vectors_after {
        Some(after) => println!("  vectors after: {}", after),
        None => println!("  vectors after: unknown"),
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mishkat_core::models::SourceMetadata;

    #[test]
    fn entry_metadata_is_flat() {
        let chunk = Chunk {
            id: "c1".into(),
            document_id: "d1".into(),
            chunk_index: 2,
            text: "chunk body".into(),
            span: 0..10,
            hash: "abc".into(),
            metadata: Some(SourceMetadata {
                filename: "a.pdf".into(),
                source_directory: "new_data".into(),
                file_path: "new_data/a.pdf".into(),
            }),
        };
        let entry = to_entry(chunk, "feed", vec![0.0; 3], "2024-01-01T00:00:00+00:00");
        assert_eq!(entry.text, "chunk body");
        assert_eq!(entry.values.len(), 3);
        assert_eq!(entry.metadata["filename"], "a.pdf");
        assert_eq!(entry.metadata["source_directory"], "new_data");
        assert_eq!(entry.metadata["file_path"], "new_data/a.pdf");
        assert_eq!(entry.metadata["document_id"], "d1");
        assert_eq!(entry.metadata["chunk_index"], 2);
        assert_eq!(entry.metadata["chunk_hash"], "abc");
        assert_eq!(entry.metadata["chunk_id"], "c1");
        assert_eq!(entry.metadata["content_hash"], "feed");
        assert!(entry.metadata.values().all(|v| !v.is_object() && !v.is_array()));
        assert!(Uuid::parse_str(&entry.id).is_ok());
    }
}
