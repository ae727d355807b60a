use crate::error::{ChatError, UploadError};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{multipart::MultipartRejection, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use pdf_chat_core::pipeline::NO_FILE_UPLOADED;
use pdf_chat_core::{Answer, DocumentUpload, PipelineError, Stage};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{info, warn};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "PDF uploaded and embeddings created successfully!";
const UPLOAD_FIELD: &str = "pdf";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub uploaded: Vec<String>,
    pub indexed: Vec<String>,
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, ChatError> {
    let indexed = state
        .pipeline
        .index_store()
        .list()
        .await
        .map_err(|error| {
            let error = PipelineError::Store(error, Stage::IndexLoaded);
            ChatError::from_pipeline(&error, state.hide_internal_errors)
        })?;

    let uploads = state.pipeline.uploads().clone();
    let uploaded = tokio::task::spawn_blocking(move || uploads.list())
        .await
        .map_err(|error| task_failure(error, state.hide_internal_errors))?;

    Ok(Json(DocumentListResponse {
        uploaded,
        indexed: indexed.iter().map(|id| id.index_name()).collect(),
    }))
}

fn task_failure(error: JoinError, hide_internal_errors: bool) -> ChatError {
    let error = PipelineError::Task(error.to_string());
    ChatError::from_pipeline(&error, hide_internal_errors)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub filename: String,
}

pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!(reason = %rejection, "upload without multipart body");
        UploadError::bad_request(NO_FILE_UPLOADED)
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| UploadError::bad_request(error.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| UploadError::bad_request(error.body_text()))?;
        upload = Some(DocumentUpload {
            file_name,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| UploadError::bad_request(NO_FILE_UPLOADED))?;
    let report = state
        .pipeline
        .ingest(upload)
        .await
        .map_err(|error| UploadError::from_pipeline(&error, state.hide_internal_errors))?;

    info!(
        filename = %report.document.document_id,
        index_name = %report.index_name,
        chunk_count = report.chunk_count,
        "upload complete"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: UPLOAD_SUCCESS_MESSAGE,
        filename: report.document.document_id.to_string(),
    }))
}

/// Body of `POST /chat`, accepted as JSON or as a urlencoded form.
///
/// Bodies that fail to parse are treated as having no fields.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub pdf_file: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for ChatRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().starts_with("application/json"));

        let parsed = if is_json {
            Json::<ChatRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .ok()
        } else {
            Form::<ChatRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .ok()
        };

        Ok(parsed.unwrap_or_default())
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    request: ChatRequest,
) -> Result<Json<Answer>, ChatError> {
    let answer = state
        .pipeline
        .ask(request.question.as_deref(), request.pdf_file.as_deref())
        .await
        .map_err(|error| ChatError::from_pipeline(&error, state.hide_internal_errors))?;

    Ok(Json(answer))
}
