//! File-system index store.
//!
//! Layout: `{root}/{filename}_faiss/index.json`. Each file is an envelope
//! carrying the owning document id and a SHA-256 checksum of the serialized
//! index; anything that does not match what `save` writes is refused by
//! `load`.

use crate::traits::IndexStore;
use crate::{DocumentId, StoreError, VectorIndex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

pub const INDEX_FILE_NAME: &str = "index.json";
const ENVELOPE_FORMAT: &str = "pdf-chat-index";
const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredIndex {
    format: String,
    version: u32,
    document_id: String,
    created_at: DateTime<Utc>,
    checksum: String,
    index: VectorIndex,
}

fn checksum_of(index: &VectorIndex) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(index)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct FsIndexStore {
    root: PathBuf,
}

impl FsIndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(document_id.index_name())
    }

    pub fn index_file(&self, document_id: &DocumentId) -> PathBuf {
        self.index_dir(document_id).join(INDEX_FILE_NAME)
    }
}

/// Writes `bytes` to `target` through a sibling temp file and a rename, so
/// readers never observe a partially written file.
pub(crate) async fn write_atomically(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let temp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    if let Err(error) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error);
    }
    if let Err(error) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error);
    }
    Ok(())
}

#[async_trait]
impl IndexStore for FsIndexStore {
    async fn save(&self, document_id: &DocumentId, index: &VectorIndex) -> Result<(), StoreError> {
        let envelope = StoredIndex {
            format: ENVELOPE_FORMAT.to_string(),
            version: ENVELOPE_VERSION,
            document_id: document_id.as_str().to_string(),
            created_at: Utc::now(),
            checksum: checksum_of(index)?,
            index: index.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)?;
        let path = self.index_file(document_id);
        write_atomically(&path, &bytes).await?;

        info!(
            document_id = %document_id,
            path = %path.display(),
            entries = index.len(),
            bytes = bytes.len(),
            "index saved"
        );
        Ok(())
    }

    async fn load(&self, document_id: &DocumentId) -> Result<Arc<VectorIndex>, StoreError> {
        let path = self.index_file(document_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(document_id.to_string()));
            }
            Err(error) => return Err(StoreError::Io(error)),
        };

        let untrusted = |reason: String| StoreError::Untrusted {
            document_id: document_id.to_string(),
            reason,
        };

        let envelope: StoredIndex = serde_json::from_slice(&bytes)
            .map_err(|error| untrusted(format!("unreadable envelope: {error}")))?;

        if envelope.format != ENVELOPE_FORMAT || envelope.version != ENVELOPE_VERSION {
            return Err(untrusted(format!(
                "unexpected format {} v{}",
                envelope.format, envelope.version
            )));
        }
        if envelope.document_id != document_id.as_str() {
            return Err(untrusted(format!(
                "entry belongs to {}",
                envelope.document_id
            )));
        }
        if checksum_of(&envelope.index)? != envelope.checksum {
            return Err(untrusted("checksum mismatch".to_string()));
        }
        envelope
            .index
            .validate()
            .map_err(|error| untrusted(error.to_string()))?;

        debug!(document_id = %document_id, entries = envelope.index.len(), "index loaded");
        Ok(Arc::new(envelope.index))
    }

    async fn list(&self) -> Result<BTreeSet<DocumentId>, StoreError> {
        let root = self.root.clone();
        let listed = tokio::task::spawn_blocking(move || list_index_dirs(&root))
            .await
            .map_err(|error| StoreError::Io(std::io::Error::new(ErrorKind::Other, error)))?;
        Ok(listed)
    }
}

fn list_index_dirs(root: &Path) -> BTreeSet<DocumentId> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.path().join(INDEX_FILE_NAME).is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            if !name.ends_with(crate::models::INDEX_NAME_SUFFIX) {
                return None;
            }
            DocumentId::parse(name).ok()
        })
        .collect()
}
