//! Lifecycle notifications.

use std::time::Duration;

use tokio::sync::broadcast;
use vstudio_models::{GenerationRequest, JobHandle, JobPhase};

use crate::artifact_ref::ArtifactRef;
use crate::error::TrackerError;

/// Receives tracker lifecycle callbacks.
///
/// Callbacks run on the tracker's task after its state lock is released;
/// they should return quickly. All methods default to no-ops.
pub trait JobObserver: Send + Sync {
    /// Fired on every phase transition.
    fn on_phase_change(&self, _phase: JobPhase, _handle: Option<&JobHandle>) {}

    /// Fired after every poll that found the job still running. `polls`
    /// counts polls issued so far; `elapsed` runs from the end of submission.
    fn on_progress(&self, _handle: &JobHandle, _polls: u32, _elapsed: Duration) {}

    /// Fired exactly once per successful job.
    fn on_complete(&self, _artifact: &ArtifactRef, _request: &GenerationRequest) {}

    /// Fired exactly once per failed job.
    fn on_failed(&self, _error: &TrackerError, _request: Option<&GenerationRequest>) {}
}

/// Lifecycle event as delivered over a broadcast channel.
#[derive(Debug, Clone)]
pub enum JobEvent {
    PhaseChanged {
        phase: JobPhase,
        handle: Option<JobHandle>,
    },
    Progress {
        handle: JobHandle,
        polls: u32,
        elapsed: Duration,
    },
    Completed {
        artifact: ArtifactRef,
        request: GenerationRequest,
    },
    Failed {
        error: TrackerError,
        request: Option<GenerationRequest>,
    },
}

impl JobEvent {
    /// Whether this event ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}

/// Observer forwarding callbacks into a broadcast channel.
///
/// Events are dropped when nobody is subscribed.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<JobEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: JobEvent) {
        // Err only means there are no receivers right now.
        let _ = self.tx.send(event);
    }
}

impl JobObserver for BroadcastObserver {
    fn on_phase_change(&self, phase: JobPhase, handle: Option<&JobHandle>) {
        self.send(JobEvent::PhaseChanged {
            phase,
            handle: handle.cloned(),
        });
    }

    fn on_progress(&self, handle: &JobHandle, polls: u32, elapsed: Duration) {
        self.send(JobEvent::Progress {
            handle: handle.clone(),
            polls,
            elapsed,
        });
    }

    fn on_complete(&self, artifact: &ArtifactRef, request: &GenerationRequest) {
        self.send(JobEvent::Completed {
            artifact: artifact.clone(),
            request: request.clone(),
        });
    }

    fn on_failed(&self, error: &TrackerError, request: Option<&GenerationRequest>) {
        self.send(JobEvent::Failed {
            error: error.clone(),
            request: request.cloned(),
        });
    }
}
