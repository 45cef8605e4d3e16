//! Error kinds shared by the ingestion and chat paths.
//!
//! Every gateway and pipeline stage reports failures as a [`RagError`]. The
//! variants map one-to-one onto the recovery policy:
//!
//! | Kind | Scope | Policy |
//! |------|-------|--------|
//! | `ConnectionFailed` | one operation | propagate, never retried |
//! | `TimedOut` | one operation | propagate |
//! | `Service` | one operation | propagate after bounded 429/5xx retry |
//! | `ExtractionFailed` | one document | log and skip |
//! | `BatchIngestFailed` | one batch | log and continue with the next batch |
//! | `DetectionFailed` | classifier | recovered to English |
//! | `StreamInterrupted` | one response | delivered as the last stream item |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RagError {
    /// The service is unreachable, refused the connection, or rejected our
    /// credentials.
    #[error("{service}: connection failed: {message}")]
    ConnectionFailed {
        service: &'static str,
        message: String,
    },

    /// The request exceeded its configured duration cap.
    #[error("{service}: request timed out after {after:?}")]
    TimedOut {
        service: &'static str,
        after: Duration,
    },

    /// The service answered with a non-success status.
    #[error("{service}: service error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Service {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("failed to extract text from {}: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("batch {batch} failed to ingest: {source}")]
    BatchIngestFailed {
        batch: usize,
        #[source]
        source: Box<RagError>,
    },

    #[error("language detection failed: {0}")]
    DetectionFailed(String),

    #[error("response stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    /// Stable machine-readable code for logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::ConnectionFailed { .. } => "connection_failed",
            RagError::TimedOut { .. } => "timed_out",
            RagError::Service { .. } => "service_error",
            RagError::ExtractionFailed { .. } => "extraction_failed",
            RagError::BatchIngestFailed { .. } => "batch_ingest_failed",
            RagError::DetectionFailed(_) => "detection_failed",
            RagError::StreamInterrupted(_) => "stream_interrupted",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn connection(service: &'static str, message: impl Into<String>) -> Self {
        RagError::ConnectionFailed {
            service,
            message: message.into(),
        }
    }

    pub fn service(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        RagError::Service {
            service,
            status,
            message: message.into(),
        }
    }

    /// Whether the failure stays local to one document or batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::ExtractionFailed { .. }
                | RagError::BatchIngestFailed { .. }
                | RagError::DetectionFailed(_)
        )
    }
}
