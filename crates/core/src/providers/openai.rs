//! Clients for OpenAI-compatible embedding and chat-completion endpoints.

use crate::embeddings::Embedder;
use crate::retry::RetryPolicy;
use crate::traits::LanguageModel;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BATCH_SIZE: usize = 512;

/// Connection settings shared by the embedding and chat clients.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::Request("missing OpenAI API key".to_string()));
        }
        Url::parse(base_url)?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

struct OpenAiTransport {
    client: Client,
    config: OpenAiConfig,
    backend: &'static str,
}

impl OpenAiTransport {
    fn new(config: OpenAiConfig, backend: &'static str) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            backend,
        })
    }

    async fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R, SearchError>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let endpoint = format!("{}/{}", self.config.base_url, path);
        let retry = self.config.retry;
        let mut attempt = 0usize;

        loop {
            let sent = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await;

            let error = match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json::<R>().await?);
                    }

                    let details = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if !RetryPolicy::should_retry_status(status) {
                        return Err(SearchError::BackendResponse {
                            backend: self.backend.to_string(),
                            details: format!("{status}: {details}"),
                        });
                    }
                    format!("{status}: {details}")
                }
                Err(error) => {
                    if !RetryPolicy::is_retryable_error(&error) {
                        return Err(error.into());
                    }
                    error.to_string()
                }
            };

            if !retry.allows_retry(attempt) {
                return Err(SearchError::RetriesExhausted {
                    backend: self.backend.to_string(),
                    attempts: attempt + 1,
                    last_error: error,
                });
            }

            attempt += 1;
            let delay = retry.backoff(attempt);
            warn!(
                backend = self.backend,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

fn ordered_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, SearchError> {
    if response.data.len() != expected {
        return Err(SearchError::BackendResponse {
            backend: "openai-embeddings".to_string(),
            details: format!(
                "returned {} embeddings for {} inputs",
                response.data.len(),
                expected
            ),
        });
    }
    response.data.sort_by_key(|entry| entry.index);
    Ok(response.data.into_iter().map(|entry| entry.embedding).collect())
}

pub struct OpenAiEmbedder {
    transport: OpenAiTransport,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig, model: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            transport: OpenAiTransport::new(config, "openai-embeddings")?,
            model: model.into(),
            dimensions: None,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Requests shortened vectors from models that support it.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
                dimensions: self.dimensions,
            };
            let response: EmbeddingResponse =
                self.transport.post_json("embeddings", &request).await?;
            vectors.extend(ordered_embeddings(response, batch.len())?);
            debug!(model = %self.model, batch = batch.len(), "embedded batch");
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::BackendResponse {
            backend: "openai-embeddings".to_string(),
            details: "no embedding returned".to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_content(response: ChatResponse) -> Result<String, SearchError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "openai-chat".to_string(),
            details: "no response generated".to_string(),
        })
}

pub struct OpenAiChatModel {
    transport: OpenAiTransport,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        config: OpenAiConfig,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            transport: OpenAiTransport::new(config, "openai-chat")?,
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };
        let response: ChatResponse = self
            .transport
            .post_json("chat/completions", &request)
            .await?;
        first_choice_content(response)
    }
}
