//! Asynchronous generation job tracking for Veo Studio.
//!
//! This crate provides:
//! - `JobTracker`, the submit / poll / resolve / download state machine
//! - `ResponseShapeResolver`, ordered extraction of result URIs
//! - Poll scheduling policy and retry utilities
//! - Lifecycle observers and a broadcast adapter
//! - Artifact references with explicit release
//! - Structured job logging and metrics

pub mod artifact_ref;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod resolver;
pub mod retry;
pub mod tracker;

pub use artifact_ref::{ArtifactRef, ArtifactRegistry};
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use logging::JobLogger;
pub use observer::{BroadcastObserver, JobEvent, JobObserver};
pub use resolver::{ResponseShapeResolver, Root, ShapeRule, DEFAULT_RULES};
pub use retry::{retry_async, FailureTracker, PollPolicy, RetryConfig, RetryResult, Retryable};
pub use tracker::{JobTracker, JobTrackerBuilder, TrackerSnapshot};
