pub mod cache;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod retry;
pub mod store;
pub mod synthesizer;
pub mod traits;
pub mod vector_index;

pub use cache::{CachedIndexStore, IndexCacheConfig};
pub use chunking::{reassemble, split_text, Chunk, ChunkingConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    ErrorKind, IndexError, IngestError, PipelineError, SearchError, Stage, StoreError,
};
pub use extractor::{extract_document_text, join_pages, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{digest_bytes, list_uploaded_pdfs, UploadStore};
pub use models::{
    Answer, DocumentFingerprint, DocumentId, DocumentUpload, EmbeddingInfo, PipelineOptions,
    UploadReport,
};
pub use pipeline::RagPipeline;
pub use providers::{OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};
pub use retry::RetryPolicy;
pub use store::FsIndexStore;
pub use synthesizer::{AnswerSynthesizer, PromptTemplate, NO_ANSWER_SENTINEL};
pub use traits::{IndexStore, LanguageModel};
pub use vector_index::{IndexEntry, SearchHit, VectorIndex};
