//! Tracker error types.

use thiserror::Error;
use vstudio_client::ClientError;
use vstudio_models::{ErrorInfo, JobPhase, ValidationError};

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Everything that can stop a job.
///
/// `Clone` so the last failure can be kept on the tracker and handed to
/// every observer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("A job is already in flight ({0})")]
    Conflict(JobPhase),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Poll rejected: {0}")]
    Rejected(String),

    #[error("Unrecognized terminal response: {0}")]
    Resolution(String),

    #[error("Job failed: {0}")]
    JobFailed(ErrorInfo),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Polling gave up after {attempts} attempts ({elapsed_secs}s)")]
    PollLimitExceeded { attempts: u32, elapsed_secs: u64 },

    #[error("Job was cancelled")]
    Cancelled,
}

impl TrackerError {
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Classify a failed poll call.
    pub fn from_poll(err: &ClientError) -> Self {
        match err {
            ClientError::NotFound(msg) => Self::NotFound(msg.clone()),
            e if e.is_permanent() => Self::Rejected(e.to_string()),
            e => Self::Transport(e.to_string()),
        }
    }

    /// Poll failures worth asking again about.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::Transport(_))
    }

    /// Errors that end the job and reach `on_failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TrackerError::Validation(_)
                | TrackerError::Conflict(_)
                | TrackerError::Transport(_)
                | TrackerError::Cancelled
        )
    }

    /// Stage the job was in when this error stopped it.
    pub fn stage(&self) -> &'static str {
        match self {
            TrackerError::Validation(_) => "validation",
            TrackerError::Conflict(_) => "conflict",
            TrackerError::Submission(_) => "submission",
            TrackerError::Transport(_)
            | TrackerError::NotFound(_)
            | TrackerError::Rejected(_)
            | TrackerError::PollLimitExceeded { .. } => "polling",
            TrackerError::Resolution(_) => "resolution",
            TrackerError::JobFailed(_) => "remote",
            TrackerError::Download(_) => "download",
            TrackerError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_error_classification() {
        let e = TrackerError::from_poll(&ClientError::NotFound("op".into()));
        assert_eq!(e, TrackerError::NotFound("op".into()));
        assert!(e.is_terminal());

        let e = TrackerError::from_poll(&ClientError::from_http_status(503, "busy"));
        assert!(e.is_retryable());
        assert!(!e.is_terminal());

        let e = TrackerError::from_poll(&ClientError::from_http_status(403, "denied"));
        assert!(matches!(e, TrackerError::Rejected(_)));
        assert!(e.is_terminal());

        let e = TrackerError::from_poll(&ClientError::invalid_response("garbage"));
        assert!(e.is_retryable());
    }

    #[test]
    fn test_stages() {
        assert_eq!(TrackerError::submission("x").stage(), "submission");
        assert_eq!(TrackerError::resolution("x").stage(), "resolution");
        assert_eq!(TrackerError::download("x").stage(), "download");
        assert_eq!(TrackerError::JobFailed(ErrorInfo::new("x")).stage(), "remote");
        assert_eq!(
            TrackerError::PollLimitExceeded { attempts: 3, elapsed_secs: 15 }.stage(),
            "polling"
        );
    }

    #[test]
    fn test_local_errors_are_not_terminal() {
        assert!(!TrackerError::Conflict(JobPhase::Polling).is_terminal());
        assert!(!TrackerError::Validation(ValidationError::MissingStartFrame).is_terminal());
        assert!(!TrackerError::Cancelled.is_terminal());
    }
}
