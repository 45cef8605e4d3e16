//! Text extraction from source files.
//!
//! PDFs go through `pdf-extract` on a blocking thread; `.txt` and `.md`
//! files are read as (lossy) UTF-8. Every failure is returned as
//! [`RagError::ExtractionFailed`] so the ingestion pipeline can log it and
//! move on to the next file.

use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use mishkat_core::models::{Document, SourceMetadata};
use mishkat_core::RagError;

/// Files larger than this are rejected without being read.
pub const MAX_FILE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" | "md" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type")]
    Unsupported,
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no extractable text")]
    Empty,
}

/// Extract plain text from in-memory file contents.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?,
        DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

/// Read and extract one file into a [`Document`].
pub async fn extract_document(path: &Path) -> Result<Document, RagError> {
    let fail = |e: ExtractError| RagError::ExtractionFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let kind = DocumentKind::from_path(path).ok_or_else(|| fail(ExtractError::Unsupported))?;

    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| fail(e.into()))?
        .len();
    if size > MAX_FILE_BYTES {
        return Err(fail(ExtractError::TooLarge {
            size,
            limit: MAX_FILE_BYTES,
        }));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| fail(e.into()))?;
    let text = match kind {
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || extract_text(&bytes, kind))
            .await
            .map_err(|e| fail(ExtractError::Pdf(format!("extraction task failed: {}", e))))?,
        DocumentKind::PlainText => extract_text(&bytes, kind),
    }
    .map_err(fail)?;

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        text,
        metadata: source_metadata(path),
        content_hash,
    })
}

fn source_metadata(path: &Path) -> SourceMetadata {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source_directory = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    SourceMetadata {
        filename,
        source_directory,
        file_path: path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a/B.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.md")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentKind::from_path(Path::new("x.docx")), None);
        assert_eq!(DocumentKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn blank_text_is_empty_error() {
        let err = extract_text(b"  \n\t ", DocumentKind::PlainText).unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
    }

    #[tokio::test]
    async fn extracts_text_file_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("new_data");
        std::fs::create_dir(&sub).unwrap();
        let path = sub.join("seerah.txt");
        std::fs::write(&path, "The Prophet was born in Makkah.").unwrap();

        let doc = extract_document(&path).await.unwrap();
        assert_eq!(doc.text, "The Prophet was born in Makkah.");
        assert_eq!(doc.metadata.filename, "seerah.txt");
        assert_eq!(doc.metadata.source_directory, "new_data");
        assert_eq!(doc.metadata.file_path, path.display().to_string());
        assert_eq!(doc.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage").unwrap();

        let err = extract_document(&path).await.unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn missing_file_is_extraction_failure() {
        let err = extract_document(Path::new("/nonexistent/dir/file.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ExtractionFailed { .. }));
    }
}
