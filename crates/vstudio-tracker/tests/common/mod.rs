//! Scripted provider, recording observer and helpers shared by tracker tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::time::Instant;
use vstudio_client::{ClientError, ClientResult, RemoteJobClient};
use vstudio_models::{
    Artifact, ArtifactOrigin, ArtifactRecord, GenerationRequest, JobHandle, JobPhase, RawStatus,
    ResultLocator,
};
use vstudio_store::{ArtifactStore, GalleryQuery, InMemoryArtifactStore, StoreError, StoreResult};
use vstudio_tracker::{ArtifactRef, JobObserver, JobTracker, TrackerConfig, TrackerError};

pub const INTERVAL: Duration = Duration::from_millis(5000);
pub const TWO_MB: usize = 2 * 1024 * 1024;

/// What one poll call returns.
pub enum PollReply {
    Pending,
    /// Full status document
    Status(Value),
    Transport,
    NotFound,
    /// 403 from the provider
    Forbidden,
    /// Wait for the gate to open, then reply
    Gated(Arc<Notify>, Box<PollReply>),
}

impl PollReply {
    /// Done with a single generated video at `uri`.
    pub fn video(uri: &str) -> Self {
        PollReply::Status(json!({
            "done": true,
            "response": { "generatedVideos": [{ "video": { "uri": uri } }] }
        }))
    }
}

/// What one download call returns.
pub enum FetchReply {
    Bytes { content_type: String, len: usize },
    Fail,
    Gated(Arc<Notify>, Box<FetchReply>),
}

impl FetchReply {
    pub fn mp4(len: usize) -> Self {
        FetchReply::Bytes {
            content_type: "video/mp4".to_string(),
            len,
        }
    }
}

/// Provider fake replaying a fixed script. Polls past the end of the script
/// are `Pending`; downloads past the end return a 2MB mp4.
pub struct ScriptedClient {
    handle: String,
    fail_submit: bool,
    submit_gate: Option<Arc<Notify>>,
    polls: Mutex<VecDeque<PollReply>>,
    fetches: Mutex<VecDeque<FetchReply>>,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub poll_times: Mutex<Vec<Instant>>,
    pub fetched: Mutex<Vec<ResultLocator>>,
}

impl ScriptedClient {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            fail_submit: false,
            submit_gate: None,
            polls: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(VecDeque::new()),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn polls(self, replies: Vec<PollReply>) -> Self {
        *self.polls.lock().unwrap() = replies.into();
        self
    }

    pub fn fetches(self, replies: Vec<FetchReply>) -> Self {
        *self.fetches.lock().unwrap() = replies.into();
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Hold every submit until `gate` is notified.
    pub fn gated_submit(mut self, gate: Arc<Notify>) -> Self {
        self.submit_gate = Some(gate);
        self
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteJobClient for ScriptedClient {
    async fn submit(&self, _request: &GenerationRequest) -> ClientResult<JobHandle> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        if self.fail_submit {
            return Err(ClientError::from_http_status(400, r#"{"error":"prompt blocked"}"#));
        }
        Ok(JobHandle::new(self.handle.clone()))
    }

    async fn poll(&self, _handle: &JobHandle) -> ClientResult<RawStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.poll_times.lock().unwrap().push(Instant::now());

        let mut reply = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollReply::Pending);

        loop {
            match reply {
                PollReply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
                PollReply::Pending => return Ok(RawStatus::pending()),
                PollReply::Status(body) => return Ok(serde_json::from_value(body).unwrap()),
                PollReply::Transport => return Err(ClientError::from_http_status(503, "unavailable")),
                PollReply::NotFound => return Err(ClientError::from_http_status(404, "gone")),
                PollReply::Forbidden => {
                    return Err(ClientError::from_http_status(403, "permission denied"))
                }
            }
        }
    }

    async fn fetch_artifact(&self, locator: &ResultLocator) -> ClientResult<Artifact> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(locator.clone());

        let mut reply = self
            .fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FetchReply::mp4(TWO_MB));

        loop {
            match reply {
                FetchReply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
                FetchReply::Bytes { content_type, len } => {
                    return Ok(Artifact::new(content_type, vec![0xAB; len], locator.clone()))
                }
                FetchReply::Fail => return Err(ClientError::from_http_status(403, "expired link")),
            }
        }
    }
}

/// Observer keeping every callback it receives.
#[derive(Default)]
pub struct RecordingObserver {
    pub phases: Mutex<Vec<JobPhase>>,
    pub completions: Mutex<Vec<(ArtifactRef, GenerationRequest)>>,
    pub failures: Mutex<Vec<TrackerError>>,
    /// `is_released()` of each reference as `on_complete` saw it
    pub released_at_delivery: Mutex<Vec<bool>>,
    pub progress: Mutex<Vec<(u32, Duration)>>,
}

impl RecordingObserver {
    pub fn phases(&self) -> Vec<JobPhase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn failures(&self) -> Vec<TrackerError> {
        self.failures.lock().unwrap().clone()
    }

    pub fn released_at_delivery(&self) -> Vec<bool> {
        self.released_at_delivery.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(u32, Duration)> {
        self.progress.lock().unwrap().clone()
    }
}

impl JobObserver for RecordingObserver {
    fn on_phase_change(&self, phase: JobPhase, _handle: Option<&JobHandle>) {
        self.phases.lock().unwrap().push(phase);
    }

    fn on_progress(&self, _handle: &JobHandle, polls: u32, elapsed: Duration) {
        self.progress.lock().unwrap().push((polls, elapsed));
    }

    fn on_complete(&self, artifact: &ArtifactRef, request: &GenerationRequest) {
        self.released_at_delivery
            .lock()
            .unwrap()
            .push(artifact.is_released());
        self.completions
            .lock()
            .unwrap()
            .push((artifact.clone(), request.clone()));
    }

    fn on_failed(&self, error: &TrackerError, _request: Option<&GenerationRequest>) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingStore {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn record(
        &self,
        _artifact: &Artifact,
        _origin: &ArtifactOrigin,
        _created_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::write_failed("disk full"))
    }

    async fn list(&self, _query: &GalleryQuery) -> StoreResult<Vec<ArtifactRecord>> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: &str) -> StoreResult<Option<ArtifactRecord>> {
        Ok(None)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        Err(StoreError::not_found(id))
    }

    async fn load_bytes(&self, _id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

pub struct Harness {
    pub tracker: JobTracker,
    pub client: Arc<ScriptedClient>,
    pub store: Arc<InMemoryArtifactStore>,
    pub observer: Arc<RecordingObserver>,
}

pub fn harness(client: ScriptedClient) -> Harness {
    harness_with(client, TrackerConfig::default())
}

pub fn harness_with(client: ScriptedClient, config: TrackerConfig) -> Harness {
    let client = Arc::new(client);
    let store = Arc::new(InMemoryArtifactStore::new());
    let observer = Arc::new(RecordingObserver::default());

    let tracker = JobTracker::builder(client.clone(), store.clone())
        .config(config)
        .observer(observer.clone())
        .build();

    Harness {
        tracker,
        client,
        store,
        observer,
    }
}

pub fn sunset() -> GenerationRequest {
    GenerationRequest::text_to_video("a sunset", "veo-3.0-generate-preview")
}

/// Let spawned tasks run for `d` of (paused) time.
pub async fn advance(d: Duration) {
    tokio::time::sleep(d).await;
}
