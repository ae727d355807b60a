//! JSON failure shapes for the upload and chat endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdf_chat_core::{ErrorKind, PipelineError};
use serde_json::json;

const HIDDEN_DETAIL: &str = "Internal server error";

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Processing => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(error: &PipelineError, hide_internal_errors: bool) -> String {
    if hide_internal_errors && error.kind() == ErrorKind::Processing {
        HIDDEN_DETAIL.to_string()
    } else {
        error.to_string()
    }
}

/// `{"success": false, "error": ...}`
#[derive(Debug)]
pub struct UploadError {
    pub status: StatusCode,
    pub message: String,
}

impl UploadError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn from_pipeline(error: &PipelineError, hide_internal_errors: bool) -> Self {
        Self {
            status: status_for(error.kind()),
            message: public_message(error, hide_internal_errors),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// `{"error": ...}`
#[derive(Debug)]
pub struct ChatError {
    pub status: StatusCode,
    pub message: String,
}

impl ChatError {
    pub fn from_pipeline(error: &PipelineError, hide_internal_errors: bool) -> Self {
        Self {
            status: status_for(error.kind()),
            message: public_message(error, hide_internal_errors),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_chat_core::{IngestError, Stage};

    #[test]
    fn statuses_follow_error_kind() {
        let validation = PipelineError::Validation("Missing question or PDF".to_string());
        let not_found = PipelineError::NotFound("Vectorstore not found".to_string());
        let processing =
            PipelineError::Ingest(IngestError::PdfParse("bad xref".to_string()), Stage::Extracted);

        assert_eq!(ChatError::from_pipeline(&validation, false).status, StatusCode::BAD_REQUEST);
        assert_eq!(ChatError::from_pipeline(&not_found, false).status, StatusCode::NOT_FOUND);
        assert_eq!(
            UploadError::from_pipeline(&processing, false).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn processing_detail_can_be_hidden() {
        let processing =
            PipelineError::Ingest(IngestError::PdfParse("bad xref".to_string()), Stage::Extracted);
        assert_eq!(
            UploadError::from_pipeline(&processing, false).message,
            "pdf parse error: bad xref"
        );
        assert_eq!(UploadError::from_pipeline(&processing, true).message, HIDDEN_DETAIL);

        let validation = PipelineError::Validation("No file selected".to_string());
        assert_eq!(UploadError::from_pipeline(&validation, true).message, "No file selected");
    }
}
