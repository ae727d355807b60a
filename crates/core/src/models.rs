use crate::chunking::ChunkingConfig;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

pub const INDEX_NAME_SUFFIX: &str = "_faiss";
const MAX_DOCUMENT_ID_CHARS: usize = 200;

fn document_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // No path separators or control characters anywhere, no leading dot.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^./\\\p{Cc}][^/\\\p{Cc}]*$").expect("document id pattern is valid")
    })
}

/// Identifier of an uploaded document, derived from its file name.
///
/// Only values that pass validation can be constructed, so an identifier can
/// never name a path outside the storage directories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Validates `name` as-is.
    pub fn new(name: &str) -> Result<Self, StoreError> {
        let name = name.trim();
        if name.is_empty()
            || name.chars().count() > MAX_DOCUMENT_ID_CHARS
            || !document_id_pattern().is_match(name)
        {
            return Err(StoreError::InvalidId(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Accepts either a file name (`report.pdf`) or an index name
    /// (`report.pdf_faiss`).
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim();
        let name = trimmed.strip_suffix(INDEX_NAME_SUFFIX).unwrap_or(trimmed);
        Self::new(name).map_err(|_| StoreError::InvalidId(raw.to_string()))
    }

    /// Derives an identifier from a client-supplied upload file name, keeping
    /// only its final path component. The name is never read as an index name.
    pub fn from_upload_name(file_name: &str) -> Result<Self, StoreError> {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name);
        let base = Path::new(base)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::InvalidId(file_name.to_string()))?;
        Self::new(base)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage name of this document's index: `"{filename}_faiss"`.
    pub fn index_name(&self) -> String {
        format!("{}{}", self.0, INDEX_NAME_SUFFIX)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

/// Raw upload as received from a client.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_id: DocumentId,
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub document: DocumentFingerprint,
    pub index_name: String,
    pub chunk_count: usize,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingInfo {
    pub vector_dimension: usize,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub chunks_used: Vec<String>,
    pub embedding_info: EmbeddingInfo,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
            max_context_chars: 12_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_round_trips_through_parse() {
        let id = DocumentId::parse("Annual Report (2024).pdf").unwrap();
        assert_eq!(id.index_name(), "Annual Report (2024).pdf_faiss");
        assert_eq!(DocumentId::parse(&id.index_name()).unwrap(), id);
    }

    #[test]
    fn path_like_identifiers_are_rejected() {
        for raw in ["", "..", "../secret.pdf", "a/b.pdf", ".hidden", "x\\y.pdf", "_faiss"] {
            assert!(DocumentId::parse(raw).is_err(), "{raw:?} should be rejected");
        }
        assert!(DocumentId::parse(&"a".repeat(201)).is_err());
    }

    #[test]
    fn upload_names_keep_only_the_file_component() {
        let id = DocumentId::from_upload_name("C:\\Users\\me\\rapport été.pdf").unwrap();
        assert_eq!(id.as_str(), "rapport été.pdf");

        let id = DocumentId::from_upload_name("../../etc/notes.pdf").unwrap();
        assert_eq!(id.as_str(), "notes.pdf");

        assert!(DocumentId::from_upload_name("uploads/..").is_err());
    }

    #[test]
    fn ordinary_punctuation_is_accepted() {
        for name in [
            "John's notes.pdf",
            "Q&A.pdf",
            "report, final.pdf",
            "v1+v2.pdf",
            "scan[1].pdf",
            "#42 invoice.pdf",
            "a..b.pdf",
        ] {
            let id = DocumentId::from_upload_name(name).unwrap();
            assert_eq!(id.as_str(), name);
            assert_eq!(DocumentId::parse(&id.index_name()).unwrap(), id);
        }
    }

    #[test]
    fn control_characters_and_leading_dots_are_rejected() {
        for raw in ["tab\there.pdf", "line\nbreak.pdf", "nul\u{0}.pdf", "..pdf", ". ", "."] {
            assert!(DocumentId::from_upload_name(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn upload_names_keep_the_index_suffix() {
        let id = DocumentId::from_upload_name("notes_faiss").unwrap();
        assert_eq!(id.as_str(), "notes_faiss");
        assert_eq!(id.index_name(), "notes_faiss_faiss");
        assert_eq!(DocumentId::parse("notes_faiss_faiss").unwrap(), id);
    }

    #[test]
    fn document_id_deserialization_is_validated() {
        let parsed: Result<DocumentId, _> = serde_json::from_str("\"../escape\"");
        assert!(parsed.is_err());
        let parsed: DocumentId = serde_json::from_str("\"guide.pdf\"").unwrap();
        assert_eq!(parsed.as_str(), "guide.pdf");
    }
}
