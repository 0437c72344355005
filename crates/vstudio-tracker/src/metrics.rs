//! Job tracker metrics.
//!
//! Counters only; installing an exporter is up to the embedding process.

use metrics::counter;

/// Metric name constants.
pub mod names {
    /// Jobs submitted by mode and outcome.
    pub const SUBMISSIONS_TOTAL: &str = "vstudio_submissions_total";

    /// Status polls issued.
    pub const POLLS_TOTAL: &str = "vstudio_polls_total";

    /// Polls that failed transiently and were retried.
    pub const POLL_FAILURES_TOTAL: &str = "vstudio_poll_failures_total";

    /// Jobs that produced an artifact.
    pub const JOBS_COMPLETED_TOTAL: &str = "vstudio_jobs_completed_total";

    /// Jobs that failed, by stage.
    pub const JOBS_FAILED_TOTAL: &str = "vstudio_jobs_failed_total";

    /// Artifact bytes downloaded.
    pub const ARTIFACT_BYTES_TOTAL: &str = "vstudio_artifact_bytes_total";
}

pub fn record_submission(mode: &str, ok: bool) {
    counter!(
        names::SUBMISSIONS_TOTAL,
        "mode" => mode.to_string(),
        "status" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_poll() {
    counter!(names::POLLS_TOTAL).increment(1);
}

pub fn record_poll_failure() {
    counter!(names::POLL_FAILURES_TOTAL).increment(1);
}

pub fn record_completion(mode: &str, bytes: usize) {
    counter!(names::JOBS_COMPLETED_TOTAL, "mode" => mode.to_string()).increment(1);
    counter!(names::ARTIFACT_BYTES_TOTAL).increment(bytes as u64);
}

pub fn record_failure(stage: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
}
