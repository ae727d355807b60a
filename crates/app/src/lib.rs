//! HTTP surface of the PDF question-answering service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const DEFAULT_LOG_FILTER: &str = "pdf_chat_server=info,pdf_chat_core=info,tower_http=info";

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/documents", get(handlers::list_documents))
        .route("/upload", post(handlers::upload_pdf))
        .route("/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
