//! Structured job logging.

use tracing::{error, info, warn, Span};
use vstudio_models::{GenerationRequest, JobHandle};

const NO_HANDLE: &str = "-";

/// Logger stamping every line with a job's handle, mode and model.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_handle: String,
    mode: &'static str,
    model: String,
}

impl JobLogger {
    pub fn new(handle: &JobHandle, request: &GenerationRequest) -> Self {
        Self {
            job_handle: handle.to_string(),
            ..Self::pending(request)
        }
    }

    /// Logger for a job the provider has not named yet.
    pub fn pending(request: &GenerationRequest) -> Self {
        Self {
            job_handle: NO_HANDLE.to_string(),
            mode: request.mode.as_str(),
            model: request.model.clone(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_handle = %self.job_handle,
            mode = self.mode,
            model = %self.model,
            "Generation started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_handle = %self.job_handle, mode = self.mode, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_handle = %self.job_handle, mode = self.mode, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_handle = %self.job_handle,
            mode = self.mode,
            model = %self.model,
            "Generation failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_handle = %self.job_handle,
            mode = self.mode,
            model = %self.model,
            "Generation complete: {}", message
        );
    }

    pub fn job_handle(&self) -> &str {
        &self.job_handle
    }

    pub fn mode(&self) -> &'static str {
        self.mode
    }

    /// Span for the job's poll loop.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation",
            job_handle = %self.job_handle,
            mode = self.mode,
            model = %self.model
        )
    }
}
