use pdf_chat_core::RagPipeline;
use std::time::Instant;

/// Shared per-process state: the pipeline and its capabilities are built
/// once at startup and reused by every request.
pub struct AppState {
    pub pipeline: RagPipeline,
    pub max_upload_bytes: usize,
    pub hide_internal_errors: bool,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: RagPipeline, max_upload_bytes: usize, hide_internal_errors: bool) -> Self {
        Self {
            pipeline,
            max_upload_bytes,
            hide_internal_errors,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
