use crate::{DocumentId, SearchError, StoreError, VectorIndex};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Runs one completion and returns the raw text output.
    async fn complete(&self, prompt: &str) -> Result<String, SearchError>;
}

/// Named persistence of one vector index per document.
///
/// `load` deserializes stored content and treats it as trusted: identifiers
/// are validated `DocumentId`s and implementations must refuse entries they
/// did not write themselves.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn save(&self, document_id: &DocumentId, index: &VectorIndex) -> Result<(), StoreError>;

    async fn load(&self, document_id: &DocumentId) -> Result<Arc<VectorIndex>, StoreError>;

    async fn list(&self) -> Result<BTreeSet<DocumentId>, StoreError>;
}
