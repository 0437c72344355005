//! Artifact persistence for Veo Studio.
//!
//! This crate provides:
//! - The `ArtifactStore` boundary the job tracker records completions into
//! - An in-memory store
//! - An append-only JSONL store that also keeps the artifact bytes on disk
//! - Gallery listing with kind filters and sort orders

pub mod config;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod query;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use jsonl::JsonlArtifactStore;
pub use memory::InMemoryArtifactStore;
pub use query::{GalleryQuery, GallerySort, KindFilter};
pub use store::ArtifactStore;
