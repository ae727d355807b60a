use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures of the remote embedding and language-model capabilities.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("{backend} gave up after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        backend: String,
        attempts: usize,
        last_error: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("cannot build an index without entries")]
    Empty,

    #[error("entry {position} has dimension {found}, expected {expected}")]
    InconsistentDimension {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("query vector dimension {query} does not match index dimension {index}")]
    DimensionMismatch { index: usize, query: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no stored index for {0}")]
    NotFound(String),

    #[error("invalid document identifier: {0:?}")]
    InvalidId(String),

    #[error("refusing to load index {document_id}: {reason}")]
    Untrusted { document_id: String, reason: String },
}

/// How a pipeline failure surfaces to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Processing,
}

/// Named steps of the upload and query flows, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracted,
    Chunked,
    Embedded,
    Indexed,
    Persisted,
    Validated,
    IndexLoaded,
    QueryEmbedded,
    Searched,
    Synthesized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Extracted => "extracted",
            Stage::Chunked => "chunked",
            Stage::Embedded => "embedded",
            Stage::Indexed => "indexed",
            Stage::Persisted => "persisted",
            Stage::Validated => "validated",
            Stage::IndexLoaded => "index_loaded",
            Stage::QueryEmbedded => "query_embedded",
            Stage::Searched => "searched",
            Stage::Synthesized => "synthesized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Ingest(#[source] IngestError, Stage),

    #[error("{0}")]
    Capability(#[source] SearchError, Stage),

    #[error("{0}")]
    Index(#[source] IndexError, Stage),

    #[error("{0}")]
    Store(#[source] StoreError, Stage),

    #[error("answer synthesis failed: {0}")]
    Synthesis(#[source] SearchError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Processing,
        }
    }

    /// The step that was being attempted when the failure happened.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Validation(_) => Some(Stage::Validated),
            PipelineError::NotFound(_) => Some(Stage::IndexLoaded),
            PipelineError::Ingest(_, stage)
            | PipelineError::Capability(_, stage)
            | PipelineError::Index(_, stage)
            | PipelineError::Store(_, stage) => Some(*stage),
            PipelineError::Synthesis(_) => Some(Stage::Synthesized),
            PipelineError::Task(_) => None,
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
