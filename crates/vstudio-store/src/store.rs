//! The artifact store boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vstudio_models::{Artifact, ArtifactOrigin, ArtifactRecord};

use crate::error::StoreResult;
use crate::query::GalleryQuery;

/// Durable, append-oriented record of completed artifacts.
///
/// Recording is not transactional with the tracker: a crash between a job
/// completing and `record` returning loses that entry.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Append one entry for a completed artifact.
    async fn record(
        &self,
        artifact: &Artifact,
        origin: &ArtifactOrigin,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord>;

    /// List entries matching the query.
    async fn list(&self, query: &GalleryQuery) -> StoreResult<Vec<ArtifactRecord>>;

    /// Look up a single entry.
    async fn get(&self, id: &str) -> StoreResult<Option<ArtifactRecord>>;

    /// Remove an entry and any bytes kept for it. Fails with `NotFound` if
    /// the id is unknown.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Load the bytes kept for an entry, if the store keeps bytes.
    async fn load_bytes(&self, id: &str) -> StoreResult<Option<Vec<u8>>>;
}
