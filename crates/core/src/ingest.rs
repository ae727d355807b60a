use crate::store::write_atomically;
use crate::{DocumentFingerprint, DocumentId, DocumentUpload, IngestError};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Uploaded PDF file names directly under `folder`, sorted.
pub fn list_uploaded_pdfs(folder: &Path) -> Vec<String> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Directory of raw uploads keyed by file name. Re-uploading a name replaces
/// the previous file.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(document_id.as_str())
    }

    pub async fn save(
        &self,
        document_id: &DocumentId,
        upload: &DocumentUpload,
    ) -> Result<DocumentFingerprint, IngestError> {
        if upload.bytes.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "uploaded file {} is empty",
                document_id
            )));
        }

        let path = self.path_for(document_id);
        write_atomically(&path, &upload.bytes).await?;

        Ok(DocumentFingerprint {
            document_id: document_id.clone(),
            stored_path: path.to_string_lossy().to_string(),
            checksum: digest_bytes(&upload.bytes),
            size_bytes: upload.bytes.len() as u64,
            received_at: Utc::now(),
        })
    }

    pub fn list(&self) -> Vec<String> {
        list_uploaded_pdfs(&self.root)
    }
}
