//! Upload and query flows.
//!
//! Upload: received → extracted → chunked → embedded → indexed → persisted.
//! Query: received → validated → index loaded → query embedded → searched →
//! synthesized. Any failing step aborts the flow; nothing already written
//! (such as the raw upload) is rolled back.

use crate::chunking::split_text;
use crate::embeddings::Embedder;
use crate::error::{IngestError, PipelineError, Stage, StoreError};
use crate::extractor::{extract_document_text, PdfExtractor};
use crate::ingest::UploadStore;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::IndexStore;
use crate::vector_index::VectorIndex;
use crate::{Answer, DocumentId, DocumentUpload, EmbeddingInfo, PipelineOptions, UploadReport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MISSING_QUERY_FIELDS: &str = "Missing question or PDF";
pub const INDEX_NOT_FOUND: &str = "Vectorstore not found";
pub const NO_FILE_UPLOADED: &str = "No file uploaded";
pub const NO_FILE_SELECTED: &str = "No file selected";

pub struct RagPipeline {
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    index_store: Arc<dyn IndexStore>,
    uploads: UploadStore,
    synthesizer: AnswerSynthesizer,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        embedder: Arc<dyn Embedder>,
        index_store: Arc<dyn IndexStore>,
        uploads: UploadStore,
        synthesizer: AnswerSynthesizer,
        options: PipelineOptions,
    ) -> Result<Self, IngestError> {
        options.chunking.validate()?;
        if options.top_k == 0 {
            return Err(IngestError::InvalidArgument("top_k must be at least 1".to_string()));
        }

        Ok(Self {
            extractor,
            embedder,
            index_store,
            uploads,
            synthesizer,
            options,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn index_store(&self) -> &Arc<dyn IndexStore> {
        &self.index_store
    }

    pub async fn ingest(&self, upload: DocumentUpload) -> Result<UploadReport, PipelineError> {
        let started = Instant::now();
        let result = self.run_ingest(upload).await;
        match &result {
            Ok(report) => info!(
                document_id = %report.document.document_id,
                chunk_count = report.chunk_count,
                dimension = report.dimension,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "upload indexed"
            ),
            Err(error) => warn!(
                stage = %error.stage().map(|stage| stage.to_string()).unwrap_or_default(),
                error = %error,
                "upload failed"
            ),
        }
        result
    }

    async fn run_ingest(&self, upload: DocumentUpload) -> Result<UploadReport, PipelineError> {
        if upload.file_name.trim().is_empty() {
            return Err(PipelineError::Validation(NO_FILE_SELECTED.to_string()));
        }
        if upload.bytes.is_empty() {
            return Err(PipelineError::Validation(NO_FILE_UPLOADED.to_string()));
        }
        let document_id = DocumentId::from_upload_name(&upload.file_name)
            .map_err(|error| PipelineError::Validation(error.to_string()))?;

        let fingerprint = self
            .uploads
            .save(&document_id, &upload)
            .await
            .map_err(|error| PipelineError::Ingest(error, Stage::Received))?;
        debug!(
            document_id = %document_id,
            checksum = %fingerprint.checksum,
            size_bytes = fingerprint.size_bytes,
            state = %Stage::Received,
            "stage reached"
        );

        let extractor = Arc::clone(&self.extractor);
        let path = self.uploads.path_for(&document_id);
        let text = tokio::task::spawn_blocking(move || {
            extract_document_text(extractor.as_ref(), &path)
        })
        .await
        .map_err(|error| PipelineError::Task(error.to_string()))?
        .map_err(|error| PipelineError::Ingest(error, Stage::Extracted))?;
        debug!(document_id = %document_id, chars = text.chars().count(), state = %Stage::Extracted, "stage reached");

        let chunks = split_text(&text, self.options.chunking)
            .map_err(|error| PipelineError::Ingest(error, Stage::Chunked))?;
        let contents = chunks
            .iter()
            .map(|chunk| chunk.content())
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if contents.is_empty() {
            return Err(PipelineError::Ingest(
                IngestError::InvalidArgument(format!("{document_id} contains no indexable text")),
                Stage::Chunked,
            ));
        }
        debug!(document_id = %document_id, chunk_count = contents.len(), state = %Stage::Chunked, "stage reached");

        let vectors = self
            .embedder
            .embed_documents(&contents)
            .await
            .map_err(|error| PipelineError::Capability(error, Stage::Embedded))?;
        if vectors.len() != contents.len() {
            return Err(PipelineError::Ingest(
                IngestError::InvalidArgument(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    contents.len()
                )),
                Stage::Embedded,
            ));
        }
        debug!(document_id = %document_id, state = %Stage::Embedded, "stage reached");

        let chunk_count = contents.len();
        let index = VectorIndex::build(self.embedder.model_name(), vectors.into_iter().zip(contents))
            .map_err(|error| PipelineError::Index(error, Stage::Indexed))?;
        debug!(document_id = %document_id, dimension = index.dimension(), state = %Stage::Indexed, "stage reached");

        self.index_store
            .save(&document_id, &index)
            .await
            .map_err(|error| PipelineError::Store(error, Stage::Persisted))?;
        debug!(document_id = %document_id, state = %Stage::Persisted, "stage reached");

        Ok(UploadReport {
            index_name: document_id.index_name(),
            document: fingerprint,
            chunk_count,
            dimension: index.dimension(),
        })
    }

    pub async fn ask(
        &self,
        question: Option<&str>,
        document: Option<&str>,
    ) -> Result<Answer, PipelineError> {
        let started = Instant::now();
        let result = self.run_query(question, document).await;
        match &result {
            Ok(answer) => info!(
                chunks_used = answer.chunks_used.len(),
                dimension = answer.embedding_info.vector_dimension,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "question answered"
            ),
            Err(error) => warn!(
                stage = %error.stage().map(|stage| stage.to_string()).unwrap_or_default(),
                error = %error,
                "query failed"
            ),
        }
        result
    }

    async fn run_query(
        &self,
        question: Option<&str>,
        document: Option<&str>,
    ) -> Result<Answer, PipelineError> {
        let question = question.map(str::trim).filter(|value| !value.is_empty());
        let document = document.map(str::trim).filter(|value| !value.is_empty());
        let (Some(question), Some(document)) = (question, document) else {
            return Err(PipelineError::Validation(MISSING_QUERY_FIELDS.to_string()));
        };
        // A name that fails validation cannot have been written by `save`.
        let document_id = DocumentId::parse(document)
            .map_err(|_| PipelineError::NotFound(INDEX_NOT_FOUND.to_string()))?;
        debug!(document_id = %document_id, state = %Stage::Validated, "stage reached");

        let index = match self.index_store.load(&document_id).await {
            Ok(index) => index,
            Err(StoreError::NotFound(_)) => {
                return Err(PipelineError::NotFound(INDEX_NOT_FOUND.to_string()))
            }
            Err(error) => return Err(PipelineError::Store(error, Stage::IndexLoaded)),
        };
        debug!(document_id = %document_id, entries = index.len(), state = %Stage::IndexLoaded, "stage reached");

        if index.embedding_model() != self.embedder.model_name() {
            warn!(
                document_id = %document_id,
                index_model = index.embedding_model(),
                query_model = self.embedder.model_name(),
                "index was built with a different embedding model"
            );
        }

        let query_vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|error| PipelineError::Capability(error, Stage::QueryEmbedded))?;
        debug!(dimension = query_vector.len(), state = %Stage::QueryEmbedded, "stage reached");

        let hits = index
            .search(&query_vector, self.options.top_k)
            .map_err(|error| PipelineError::Index(error, Stage::Searched))?;
        let passages = hits.into_iter().map(|hit| hit.text).collect::<Vec<_>>();
        debug!(hits = passages.len(), state = %Stage::Searched, "stage reached");

        let answer = self
            .synthesizer
            .answer(question, &passages)
            .await
            .map_err(PipelineError::Synthesis)?;
        debug!(model = self.synthesizer.model_name(), state = %Stage::Synthesized, "stage reached");

        Ok(Answer {
            question: question.to_string(),
            answer,
            chunks_used: passages,
            embedding_info: EmbeddingInfo {
                vector_dimension: query_vector.len(),
                embedding_model: self.embedder.model_name().to_string(),
            },
        })
    }
}
