//! The job tracker: one generation request from submission to artifact.
//!
//! A tracker runs at most one job at a time. `start` submits and spawns a
//! poll loop; the loop sleeps, polls, and on a terminal response resolves,
//! downloads, records and notifies. Every step that resumes after an await
//! re-checks the job epoch and phase under the state lock, so responses that
//! arrive after `cancel` (or after a newer `start`) are dropped without
//! effect.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use chrono::Utc;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument, Span};
use vstudio_client::RemoteJobClient;
use vstudio_models::{
    Artifact, ArtifactOrigin, GenerationRequest, JobHandle, JobPhase, JobStatus, ResultLocator,
};
use vstudio_store::ArtifactStore;

use crate::artifact_ref::{ArtifactRef, ArtifactRegistry};
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::observer::{BroadcastObserver, JobEvent, JobObserver};
use crate::resolver::ResponseShapeResolver;
use crate::retry::{retry_async, FailureTracker, RetryConfig, RetryResult};

/// Observable state of a tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub phase: JobPhase,
    pub handle: Option<JobHandle>,
    pub last_error: Option<TrackerError>,
}

struct TrackerState {
    phase: JobPhase,
    handle: Option<JobHandle>,
    request: Option<GenerationRequest>,
    last_error: Option<TrackerError>,
    artifact: Option<ArtifactRef>,
    /// Bumped by every start and cancel; stale work compares against it
    epoch: u64,
    /// A poll request is outstanding
    in_flight: bool,
    /// A completed job is being recorded and delivered to observers
    completing: bool,
    polls: u32,
    polling_since: Option<Instant>,
    failures: FailureTracker,
    cancel: Arc<Notify>,
}

impl TrackerState {
    fn new(max_logged_failures: u32) -> Self {
        Self {
            phase: JobPhase::Idle,
            handle: None,
            request: None,
            last_error: None,
            artifact: None,
            epoch: 0,
            in_flight: false,
            completing: false,
            polls: 0,
            polling_since: None,
            failures: FailureTracker::new(max_logged_failures),
            cancel: Arc::new(Notify::new()),
        }
    }

    fn is_current(&self, epoch: u64, phase: JobPhase) -> bool {
        self.epoch == epoch && self.phase == phase
    }

    fn logger(&self) -> Option<JobLogger> {
        let request = self.request.as_ref()?;
        Some(match &self.handle {
            Some(handle) => JobLogger::new(handle, request),
            None => JobLogger::pending(request),
        })
    }
}

enum Step {
    Continue,
    Stop,
}

struct Inner {
    client: Arc<dyn RemoteJobClient>,
    store: Arc<dyn ArtifactStore>,
    resolver: ResponseShapeResolver,
    registry: ArtifactRegistry,
    config: TrackerConfig,
    events: BroadcastObserver,
    observers: RwLock<Vec<Arc<dyn JobObserver>>>,
    state: Mutex<TrackerState>,
}

/// Drives one generation job at a time against a remote provider.
///
/// Cheap to clone; clones share the same job. Dropping the last clone stops
/// the poll loop and releases any held artifact reference.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<Inner>,
}

/// Builder for [`JobTracker`].
pub struct JobTrackerBuilder {
    client: Arc<dyn RemoteJobClient>,
    store: Arc<dyn ArtifactStore>,
    config: TrackerConfig,
    resolver: ResponseShapeResolver,
    registry: ArtifactRegistry,
    observers: Vec<Arc<dyn JobObserver>>,
}

impl JobTrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: ResponseShapeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Share a registry between trackers (one per UI process, say).
    pub fn registry(mut self, registry: ArtifactRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> JobTracker {
        let state = TrackerState::new(self.config.max_logged_poll_failures);
        JobTracker {
            inner: Arc::new(Inner {
                client: self.client,
                store: self.store,
                resolver: self.resolver,
                registry: self.registry,
                events: BroadcastObserver::new(self.config.event_capacity),
                config: self.config,
                observers: RwLock::new(self.observers),
                state: Mutex::new(state),
            }),
        }
    }
}

impl JobTracker {
    pub fn new(
        client: Arc<dyn RemoteJobClient>,
        store: Arc<dyn ArtifactStore>,
        config: TrackerConfig,
    ) -> Self {
        Self::builder(client, store).config(config).build()
    }

    pub fn builder(
        client: Arc<dyn RemoteJobClient>,
        store: Arc<dyn ArtifactStore>,
    ) -> JobTrackerBuilder {
        JobTrackerBuilder {
            client,
            store,
            config: TrackerConfig::default(),
            resolver: ResponseShapeResolver::default(),
            registry: ArtifactRegistry::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn JobObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// Receive lifecycle events over a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn phase(&self) -> JobPhase {
        self.inner.lock_state().phase
    }

    pub fn handle(&self) -> Option<JobHandle> {
        self.inner.lock_state().handle.clone()
    }

    pub fn last_error(&self) -> Option<TrackerError> {
        self.inner.lock_state().last_error.clone()
    }

    /// Request of the current or most recent job.
    pub fn request(&self) -> Option<GenerationRequest> {
        self.inner.lock_state().request.clone()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.inner.lock_state();
        TrackerSnapshot {
            phase: state.phase,
            handle: state.handle.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Reference to the last completed artifact, while the tracker holds it.
    pub fn artifact(&self) -> Option<ArtifactRef> {
        self.inner.lock_state().artifact.clone()
    }

    /// Take ownership of the completed artifact's reference. The tracker will
    /// no longer release it on the next start, cancel or reset.
    pub fn take_artifact(&self) -> Option<ArtifactRef> {
        self.inner.lock_state().artifact.take()
    }

    /// Validate and submit a request, then start polling it.
    ///
    /// Fails synchronously with `Validation` (no network call) or `Conflict`
    /// (a job is live, or the last one is still being recorded and
    /// delivered). A rejected submission moves the tracker to `Failed`,
    /// fires `on_failed` and is also returned here.
    pub async fn start(&self, request: GenerationRequest) -> TrackerResult<JobHandle> {
        request.validate()?;

        let (epoch, superseded) = {
            let mut state = self.inner.lock_state();
            if state.phase.is_live() {
                warn!(phase = %state.phase, "Rejecting start while a job is live");
                return Err(TrackerError::Conflict(state.phase));
            }
            if state.completing {
                warn!("Rejecting start while the previous result is being delivered");
                return Err(TrackerError::Conflict(JobPhase::Complete));
            }

            state.epoch += 1;
            state.phase = JobPhase::Submitting;
            state.handle = None;
            state.request = Some(request.clone());
            state.last_error = None;
            state.in_flight = false;
            state.polls = 0;
            state.polling_since = None;
            state.failures = FailureTracker::new(self.inner.config.max_logged_poll_failures);
            state.cancel = Arc::new(Notify::new());
            (state.epoch, state.artifact.take())
        };

        if let Some(previous) = superseded {
            previous.release();
        }
        self.inner.emit_phase(JobPhase::Submitting, None);

        let mode = request.mode.as_str();
        JobLogger::pending(&request).log_start("submitting");

        let submitted = self.inner.client.submit(&request).await;
        metrics::record_submission(mode, submitted.is_ok());

        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                let err = TrackerError::submission(e.to_string());
                self.inner.fail(epoch, JobPhase::Submitting, err.clone());
                return Err(err);
            }
        };

        let cancel = {
            let mut state = self.inner.lock_state();
            if !state.is_current(epoch, JobPhase::Submitting) {
                info!(job_handle = %handle, "Discarding submission of a cancelled job");
                return Err(TrackerError::Cancelled);
            }
            state.phase = JobPhase::Polling;
            state.handle = Some(handle.clone());
            state.polling_since = Some(Instant::now());
            Arc::clone(&state.cancel)
        };

        let logger = JobLogger::new(&handle, &request);
        logger.log_progress(&format!(
            "submitted, polling every {:?}",
            self.inner.config.poll.interval
        ));
        self.inner.emit_phase(JobPhase::Polling, Some(&handle));

        spawn_poll_loop(&self.inner, epoch, cancel, logger.create_span());
        Ok(handle)
    }

    /// Poll the live job once, outside the schedule.
    ///
    /// A no-op unless the tracker is `Polling` with a handle and no poll is
    /// already outstanding.
    pub async fn poll(&self) {
        let epoch = self.inner.lock_state().epoch;
        self.inner.poll_once(epoch).await;
    }

    /// Stop tracking the live job locally.
    ///
    /// Clears the handle, stops the poll loop and returns to `Idle`. The
    /// provider is not told; its job may keep running. Responses to calls
    /// already in flight are discarded when they arrive. Returns `false` if
    /// no job was live.
    pub fn cancel(&self) -> bool {
        let (handle, cancel, held) = {
            let mut state = self.inner.lock_state();
            if !state.phase.is_live() {
                return false;
            }
            let logger = state.logger();
            state.epoch += 1;
            state.phase = JobPhase::Idle;
            state.in_flight = false;
            if let Some(logger) = logger {
                logger.log_warning("cancelled locally; the provider job is not stopped");
            }
            (
                state.handle.take(),
                Arc::clone(&state.cancel),
                state.artifact.take(),
            )
        };

        cancel.notify_one();
        if let Some(artifact) = held {
            artifact.release();
        }
        self.inner.emit_phase(JobPhase::Idle, handle.as_ref());
        true
    }

    /// Cancel any live job and clear terminal state back to `Idle`,
    /// releasing the held artifact reference.
    pub fn reset(&self) {
        self.cancel();

        let (changed, held) = {
            let mut state = self.inner.lock_state();
            let changed = state.phase != JobPhase::Idle;
            state.phase = JobPhase::Idle;
            state.handle = None;
            state.request = None;
            state.last_error = None;
            // A completion still in delivery releases its own reference once
            // observers have seen it.
            let held = if state.completing {
                None
            } else {
                state.artifact.take()
            };
            (changed, held)
        };

        if let Some(artifact) = held {
            artifact.release();
        }
        if changed {
            self.inner.emit_phase(JobPhase::Idle, None);
        }
    }
}

fn spawn_poll_loop(inner: &Arc<Inner>, epoch: u64, cancel: Arc<Notify>, span: Span) {
    let weak: Weak<Inner> = Arc::downgrade(inner);

    tokio::spawn(
        async move {
            let mut completed = 0u32;
            loop {
                let delay = match weak.upgrade() {
                    Some(inner) => inner.config.poll.delay_after(completed),
                    None => return,
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.notified() => {
                        debug!("Poll loop cancelled");
                        return;
                    }
                }

                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match inner.poll_once(epoch).await {
                    Step::Continue => completed += 1,
                    Step::Stop => return,
                }
            }
        }
        .instrument(span),
    );
}

impl Inner {
    // A poisoned lock still holds a consistent state: every mutation is a
    // handful of field writes with no early exits in between.
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn poll_once(&self, epoch: u64) -> Step {
        let begun = {
            let mut state = self.lock_state();
            if !state.is_current(epoch, JobPhase::Polling) {
                return Step::Stop;
            }
            let Some(handle) = state.handle.clone() else {
                return Step::Stop;
            };
            if state.in_flight {
                return Step::Continue;
            }

            let elapsed = state.polling_since.map(|t| t.elapsed()).unwrap_or_default();
            if self.config.poll.allows(state.polls, elapsed) {
                state.in_flight = true;
                state.polls += 1;
                Ok(handle)
            } else {
                Err(TrackerError::PollLimitExceeded {
                    attempts: state.polls,
                    elapsed_secs: elapsed.as_secs(),
                })
            }
        };

        let handle = match begun {
            Ok(handle) => handle,
            Err(limit) => {
                self.fail(epoch, JobPhase::Polling, limit);
                return Step::Stop;
            }
        };

        metrics::record_poll();
        let result = self.client.poll(&handle).await;

        let raw = {
            let mut state = self.lock_state();
            if !state.is_current(epoch, JobPhase::Polling) {
                debug!(job_handle = %handle, "Discarding poll response for a superseded job");
                return Step::Stop;
            }

            match result {
                Ok(raw) => {
                    state.failures.record_success();
                    raw
                }
                Err(e) => {
                    let err = TrackerError::from_poll(&e);
                    if !err.is_retryable() {
                        drop(state);
                        self.fail(epoch, JobPhase::Polling, err);
                        return Step::Stop;
                    }

                    state.in_flight = false;
                    let log = state.failures.record_failure();
                    let consecutive = state.failures.failure_count();
                    drop(state);

                    metrics::record_poll_failure();
                    if log {
                        warn!(
                            job_handle = %handle,
                            consecutive_failures = consecutive,
                            "Transient poll failure, retrying: {}", e
                        );
                    }
                    return Step::Continue;
                }
            }
        };

        match self.resolver.resolve(&raw) {
            Ok(JobStatus::Pending) => {
                let (polls, elapsed) = {
                    let mut state = self.lock_state();
                    if !state.is_current(epoch, JobPhase::Polling) {
                        return Step::Stop;
                    }
                    state.in_flight = false;
                    let elapsed = state.polling_since.map(|t| t.elapsed()).unwrap_or_default();
                    (state.polls, elapsed)
                };
                debug!(
                    job_handle = %handle,
                    polls,
                    elapsed_secs = elapsed.as_secs(),
                    "Job still running"
                );
                for observer in self.observer_snapshot() {
                    observer.on_progress(&handle, polls, elapsed);
                }
                self.events.on_progress(&handle, polls, elapsed);
                Step::Continue
            }
            Ok(JobStatus::Failed(info)) => {
                self.fail(epoch, JobPhase::Polling, TrackerError::JobFailed(info));
                Step::Stop
            }
            Ok(JobStatus::Succeeded(locator)) => {
                self.download(epoch, &handle, locator).await;
                Step::Stop
            }
            Err(err) => {
                self.fail(epoch, JobPhase::Polling, err);
                Step::Stop
            }
        }
    }

    async fn download(&self, epoch: u64, handle: &JobHandle, locator: ResultLocator) {
        let logger = {
            let mut state = self.lock_state();
            if !state.is_current(epoch, JobPhase::Polling) {
                return;
            }
            state.phase = JobPhase::Downloading;
            state.in_flight = false;
            state.logger()
        };
        self.emit_phase(JobPhase::Downloading, Some(handle));
        if let Some(logger) = logger {
            logger.log_progress(&format!("downloading {}", locator));
        }

        match self.client.fetch_artifact(&locator).await {
            Ok(artifact) => self.complete(epoch, handle, artifact).await,
            Err(e) => {
                self.fail(epoch, JobPhase::Downloading, TrackerError::download(e.to_string()));
            }
        }
    }

    async fn complete(&self, epoch: u64, handle: &JobHandle, artifact: Artifact) {
        let bytes = artifact.len();

        let (artifact_ref, request) = {
            let mut state = self.lock_state();
            if !state.is_current(epoch, JobPhase::Downloading) {
                debug!(job_handle = %handle, "Discarding download for a superseded job");
                return;
            }
            let Some(request) = state.request.clone() else {
                return;
            };

            let artifact_ref = self.registry.register(artifact);
            state.phase = JobPhase::Complete;
            state.handle = None;
            state.last_error = None;
            state.artifact = Some(artifact_ref.clone());
            state.completing = true;
            (artifact_ref, request)
        };

        metrics::record_completion(request.mode.as_str(), bytes);
        JobLogger::new(handle, &request).log_completion(&format!(
            "{} bytes of {} as {}",
            bytes,
            artifact_ref.content_type(),
            artifact_ref.locator()
        ));
        self.emit_phase(JobPhase::Complete, Some(handle));

        self.record(&artifact_ref, &request).await;

        for observer in self.observer_snapshot() {
            observer.on_complete(&artifact_ref, &request);
        }
        self.events.on_complete(&artifact_ref, &request);

        let orphaned = {
            let mut state = self.lock_state();
            state.completing = false;
            if state.is_current(epoch, JobPhase::Complete) {
                None
            } else {
                state.artifact.take()
            }
        };
        if let Some(artifact) = orphaned {
            artifact.release();
        }
    }

    /// Store failures are logged, never surfaced: the job itself succeeded.
    async fn record(&self, artifact_ref: &ArtifactRef, request: &GenerationRequest) {
        let origin = ArtifactOrigin::from(request);
        let created_at = Utc::now();
        let artifact = artifact_ref.artifact();
        let retry = RetryConfig::new("artifact_store_record")
            .with_max_retries(self.config.store_retries);

        match retry_async(&retry, || self.store.record(artifact, &origin, created_at)).await {
            RetryResult::Success(record) => {
                info!(record_id = %record.id, kind = %record.kind, "Artifact recorded");
            }
            RetryResult::Failed { error, attempts } => {
                tracing::error!(
                    locator = %artifact_ref.locator(),
                    attempts,
                    "Failed to record artifact: {}", error
                );
            }
        }
    }

    /// Move a current job to `Failed`. Returns `false` when the job was
    /// superseded and the error was dropped.
    fn fail(&self, epoch: u64, expected: JobPhase, err: TrackerError) -> bool {
        let (handle, request, logger) = {
            let mut state = self.lock_state();
            if !state.is_current(epoch, expected) {
                debug!(error = %err, "Discarding failure of a superseded job");
                return false;
            }
            let logger = state.logger();
            state.phase = JobPhase::Failed;
            state.in_flight = false;
            state.last_error = Some(err.clone());
            (state.handle.take(), state.request.clone(), logger)
        };

        metrics::record_failure(err.stage());
        if let Some(logger) = logger {
            logger.log_error(&format!("{} stage: {}", err.stage(), err));
        }
        self.emit_phase(JobPhase::Failed, handle.as_ref());

        for observer in self.observer_snapshot() {
            observer.on_failed(&err, request.as_ref());
        }
        self.events.on_failed(&err, request.as_ref());
        true
    }

    fn observer_snapshot(&self) -> Vec<Arc<dyn JobObserver>> {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn emit_phase(&self, phase: JobPhase, handle: Option<&JobHandle>) {
        debug!(phase = %phase, job_handle = ?handle.map(JobHandle::as_str), "Phase changed");
        for observer in self.observer_snapshot() {
            observer.on_phase_change(phase, handle);
        }
        self.events.on_phase_change(phase, handle);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.cancel.notify_one();
    }
}
