//! Remote job handles, wire statuses and tracker phases.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ResultLocator;

/// Opaque identifier issued by the provider when a job is submitted.
///
/// For the Gemini API this is the long-running operation name, e.g.
/// `models/veo-3.0-generate-preview/operations/abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle phase of a job tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// No job is live
    #[default]
    Idle,
    /// Submission call in flight
    Submitting,
    /// Waiting for the provider to finish
    Polling,
    /// Fetching the finished artifact
    Downloading,
    /// Artifact available
    Complete,
    /// Terminal failure, see the tracker's last error
    Failed,
}

impl JobPhase {
    /// Get string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Submitting => "submitting",
            JobPhase::Polling => "polling",
            JobPhase::Downloading => "downloading",
            JobPhase::Complete => "complete",
            JobPhase::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Complete | JobPhase::Failed)
    }

    /// Check if a job is currently live in this phase.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            JobPhase::Submitting | JobPhase::Polling | JobPhase::Downloading
        )
    }

    /// Whether a new job may be started from this phase.
    pub fn accepts_start(&self) -> bool {
        !self.is_live()
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by the provider (or derived from its response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorInfo {
    /// Provider error code, when one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Human-readable message
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Build from a loosely-typed provider error object.
    ///
    /// Accepts `{code, message}` objects, bare strings, and falls back to the
    /// JSON text of anything else.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Object(map) => {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Self {
                    code: map.get("code").and_then(Value::as_i64),
                    message,
                }
            }
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Status document returned by one poll, as the provider sent it.
///
/// Success and failure payloads vary between API versions and media types,
/// so they are kept as raw JSON until resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawStatus {
    /// Operation name echoed back by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the provider considers the job finished
    #[serde(default)]
    pub done: bool,
    /// Success payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Success payload under the legacy root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RawStatus {
    /// A not-yet-finished status.
    pub fn pending() -> Self {
        Self::default()
    }

    /// A finished status carrying a success payload.
    pub fn done_with_response(response: Value) -> Self {
        Self {
            done: true,
            response: Some(response),
            ..Default::default()
        }
    }

    /// A finished status carrying a failure payload.
    pub fn done_with_error(error: Value) -> Self {
        Self {
            done: true,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Canonical in-process status of a job after its response was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Provider is still working
    Pending,
    /// Finished, artifact available at the locator
    Succeeded(ResultLocator),
    /// Finished with a provider-reported failure
    Failed(ErrorInfo),
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_start_acceptance() {
        assert!(JobPhase::Idle.accepts_start());
        assert!(JobPhase::Complete.accepts_start());
        assert!(JobPhase::Failed.accepts_start());
        assert!(!JobPhase::Submitting.accepts_start());
        assert!(!JobPhase::Polling.accepts_start());
        assert!(!JobPhase::Downloading.accepts_start());
    }

    #[test]
    fn test_phase_terminal() {
        assert!(JobPhase::Complete.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
        assert!(!JobPhase::Idle.is_terminal());
        assert_eq!(JobPhase::Downloading.to_string(), "downloading");
    }

    #[test]
    fn test_raw_status_parses_operation_document() {
        let raw: RawStatus = serde_json::from_value(json!({
            "name": "models/veo/operations/op_1",
            "done": true,
            "response": { "generatedVideos": [] }
        }))
        .unwrap();

        assert!(raw.done);
        assert_eq!(raw.name.as_deref(), Some("models/veo/operations/op_1"));
        assert!(raw.response.is_some());
        assert!(raw.error.is_none());
    }

    #[test]
    fn test_raw_status_missing_done_is_pending() {
        let raw: RawStatus = serde_json::from_value(json!({ "name": "op" })).unwrap();
        assert!(!raw.done);
    }

    #[test]
    fn test_error_info_from_value() {
        let info = ErrorInfo::from_value(&json!({ "code": 3, "message": "bad prompt" }));
        assert_eq!(info.code, Some(3));
        assert_eq!(info.message, "bad prompt");
        assert_eq!(info.to_string(), "bad prompt (code 3)");

        let info = ErrorInfo::from_value(&json!("quota exhausted"));
        assert_eq!(info.message, "quota exhausted");
        assert_eq!(info.code, None);
    }
}
