//! Shared data models for Veo Studio.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests and their per-mode input validation
//! - Remote job handles, wire statuses and tracker phases
//! - Downloaded artifacts and the records kept for them
//! - The catalog of known provider models

pub mod artifact;
pub mod catalog;
pub mod job;
pub mod request;

// Re-export common types
pub use artifact::{Artifact, ArtifactOrigin, ArtifactRecord, MediaKind, ResultLocator};
pub use catalog::{ImageModel, VeoModel};
pub use job::{ErrorInfo, JobHandle, JobPhase, JobStatus, RawStatus};
pub use request::{
    AspectRatio, GeneratedVideo, GenerationMode, GenerationRequest, InlineImage, Resolution,
    ValidationError,
};
