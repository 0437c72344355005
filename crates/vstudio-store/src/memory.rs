//! In-process artifact store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use vstudio_models::{Artifact, ArtifactOrigin, ArtifactRecord};

use crate::error::{StoreError, StoreResult};
use crate::query::GalleryQuery;
use crate::store::ArtifactStore;

#[derive(Default)]
struct Entries {
    records: Vec<ArtifactRecord>,
    bytes: HashMap<String, Vec<u8>>,
}

/// Store keeping records and bytes in memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<Entries>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn record(
        &self,
        artifact: &Artifact,
        origin: &ArtifactOrigin,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord> {
        let record = ArtifactRecord::new(artifact, origin, created_at);

        let mut entries = self.entries.write().await;
        entries.bytes.insert(record.id.clone(), artifact.bytes.clone());
        entries.records.push(record.clone());

        debug!(record_id = %record.id, kind = %record.kind, "Recorded artifact in memory");
        Ok(record)
    }

    async fn list(&self, query: &GalleryQuery) -> StoreResult<Vec<ArtifactRecord>> {
        let records = self.entries.read().await.records.clone();
        Ok(query.apply(records))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<ArtifactRecord>> {
        let entries = self.entries.read().await;
        Ok(entries.records.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let before = entries.records.len();
        entries.records.retain(|r| r.id != id);
        if entries.records.len() == before {
            return Err(StoreError::not_found(id));
        }
        entries.bytes.remove(id);
        Ok(())
    }

    async fn load_bytes(&self, id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.bytes.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstudio_models::{MediaKind, ResultLocator};

    fn video() -> Artifact {
        Artifact::new("video/mp4", vec![1, 2, 3], ResultLocator::new("https://example/x"))
    }

    #[tokio::test]
    async fn test_record_get_delete() {
        let store = InMemoryArtifactStore::new();
        let record = store
            .record(&video(), &ArtifactOrigin::image("p", "m"), Utc::now())
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.kind, MediaKind::Video);
        assert_eq!(store.load_bytes(&record.id).await.unwrap(), Some(vec![1, 2, 3]));

        store.delete(&record.id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(store.load_bytes(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = InMemoryArtifactStore::new();
        let err = store.delete("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
