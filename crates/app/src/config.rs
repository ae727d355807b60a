use anyhow::Context;
use clap::{Parser, ValueEnum};
use pdf_chat_core::providers::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL,
};
use pdf_chat_core::{
    AnswerSynthesizer, CachedIndexStore, CharacterNgramEmbedder, ChunkingConfig, Embedder,
    FsIndexStore, IndexCacheConfig, IndexStore, LopdfExtractor, OpenAiChatModel, OpenAiConfig,
    OpenAiEmbedder, PipelineOptions, RagPipeline, RetryPolicy, UploadStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    /// OpenAI-compatible embeddings endpoint.
    Openai,
    /// Offline character-trigram hashing embedder.
    Hashing,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "pdf-chat-server", version, about = "Upload a PDF and ask questions about it")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PDF_CHAT_BIND", default_value = "127.0.0.1:5000")]
    pub bind: String,

    /// Directory holding raw uploaded files
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory holding serialized vector indices
    #[arg(long, env = "EMBEDDINGS_FOLDER", default_value = "embeddings")]
    pub embeddings_dir: PathBuf,

    /// API key for the OpenAI-compatible endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingProvider::Openai)]
    pub embedding_provider: EmbeddingProvider,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Per-request timeout for embedding and chat calls
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Attempts per remote call, including the first one
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Passages retrieved per question
    #[arg(long, env = "TOP_K", default_value_t = 3)]
    pub top_k: usize,

    #[arg(long, env = "MAX_CONTEXT_CHARS", default_value_t = 12_000)]
    pub max_context_chars: usize,

    /// Loaded indices kept in memory; 0 reloads from disk on every query
    #[arg(long, env = "INDEX_CACHE_CAPACITY", default_value_t = 16)]
    pub index_cache_capacity: u64,

    #[arg(long, env = "INDEX_CACHE_TTL_SECS", default_value_t = 600)]
    pub index_cache_ttl_secs: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Replace processing-error details with a generic message
    #[arg(long, env = "HIDE_INTERNAL_ERRORS", default_value_t = false)]
    pub hide_internal_errors: bool,
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            chunking: ChunkingConfig {
                max_chars: self.chunk_size,
                overlap_chars: self.chunk_overlap,
                ..ChunkingConfig::default()
            },
            top_k: self.top_k,
            max_context_chars: self.max_context_chars,
        }
    }

    fn openai_config(&self) -> anyhow::Result<OpenAiConfig> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is required")?;
        let config = OpenAiConfig::new(api_key, &self.openai_base_url)
            .context("invalid OpenAI settings")?
            .with_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
            .with_retry(RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                ..RetryPolicy::default()
            });
        Ok(config)
    }
}

/// Builds every capability once and wires them into the shared state.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating {}", config.upload_dir.display()))?;
    std::fs::create_dir_all(&config.embeddings_dir)
        .with_context(|| format!("creating {}", config.embeddings_dir.display()))?;

    let openai = config.openai_config()?;

    let embedder: Arc<dyn Embedder> = match config.embedding_provider {
        EmbeddingProvider::Openai => Arc::new(OpenAiEmbedder::new(
            openai.clone(),
            config.embedding_model.clone(),
        )?),
        EmbeddingProvider::Hashing => Arc::new(CharacterNgramEmbedder::default()),
    };
    let language_model = Arc::new(OpenAiChatModel::new(
        openai,
        config.chat_model.clone(),
        config.temperature,
    )?);

    let fs_store = FsIndexStore::new(&config.embeddings_dir);
    let index_store: Arc<dyn IndexStore> = if config.index_cache_capacity == 0 {
        Arc::new(fs_store)
    } else {
        Arc::new(CachedIndexStore::new(
            fs_store,
            IndexCacheConfig {
                max_capacity: config.index_cache_capacity,
                ttl: Duration::from_secs(config.index_cache_ttl_secs),
            },
        ))
    };

    let pipeline = RagPipeline::new(
        Arc::new(LopdfExtractor),
        embedder,
        index_store,
        UploadStore::new(&config.upload_dir),
        AnswerSynthesizer::new(language_model, config.max_context_chars),
        config.pipeline_options(),
    )?;

    info!(
        embedding_model = pipeline.embedding_model(),
        chat_model = %config.chat_model,
        upload_dir = %config.upload_dir.display(),
        embeddings_dir = %config.embeddings_dir.display(),
        index_cache_capacity = config.index_cache_capacity,
        "pipeline ready"
    );

    Ok(AppState::new(
        pipeline,
        config.max_upload_bytes,
        config.hide_internal_errors,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["pdf-chat-server"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn defaults_follow_the_reference_service() {
        let config = parse(&[]);
        let options = config.pipeline_options();
        assert_eq!(options.chunking.max_chars, 1000);
        assert_eq!(options.chunking.overlap_chars, 200);
        assert_eq!(options.top_k, 3);
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn state_builds_offline_with_hashing_embedder() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let upload_dir = dir.path().join("uploads");
        let embeddings_dir = dir.path().join("embeddings");
        let config = parse(&[
            "--openai-api-key",
            "sk-test",
            "--embedding-provider",
            "hashing",
            "--upload-dir",
            upload_dir.to_str().unwrap_or_default(),
            "--embeddings-dir",
            embeddings_dir.to_str().unwrap_or_default(),
        ]);

        let state = build_state(&config)?;
        assert_eq!(state.pipeline.embedding_model(), "character-trigram-hash");
        assert!(upload_dir.is_dir());
        assert!(embeddings_dir.is_dir());
        Ok(())
    }

    #[test]
    fn invalid_settings_fail_at_startup() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let upload_dir = dir.path().join("uploads");
        let embeddings_dir = dir.path().join("embeddings");
        let dirs = [
            "--upload-dir",
            upload_dir.to_str().unwrap_or_default(),
            "--embeddings-dir",
            embeddings_dir.to_str().unwrap_or_default(),
        ];

        let mut bad_url = vec!["--openai-api-key", "sk-test", "--openai-base-url", "nope"];
        bad_url.extend_from_slice(&dirs);
        assert!(build_state(&parse(&bad_url)).is_err());

        let mut bad_overlap = vec!["--openai-api-key", "sk-test", "--chunk-overlap", "1000"];
        bad_overlap.extend_from_slice(&dirs);
        assert!(build_state(&parse(&bad_overlap)).is_err());
        Ok(())
    }
}
