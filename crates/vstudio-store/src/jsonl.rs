//! Append-only JSONL store with artifact bytes kept next to the index.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vstudio_models::{Artifact, ArtifactOrigin, ArtifactRecord};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::query::GalleryQuery;
use crate::store::ArtifactStore;

/// Store writing one JSON line per artifact to `gallery.jsonl` and the bytes
/// to `<id>.<ext>` in the same directory.
///
/// Writers are serialized by an internal lock; readers take the same lock so
/// they never observe a half-written line or a half-rewritten index.
pub struct JsonlArtifactStore {
    config: StoreConfig,
    lock: Mutex<()>,
}

impl JsonlArtifactStore {
    /// Open the store, creating its directory if needed.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.dir).await.map_err(|e| {
            StoreError::config_error(format!(
                "cannot create store dir {}: {}",
                config.dir.display(),
                e
            ))
        })?;

        info!(dir = %config.dir.display(), "Opened artifact store");

        Ok(Self {
            config,
            lock: Mutex::new(()),
        })
    }

    pub async fn from_env() -> StoreResult<Self> {
        Self::open(StoreConfig::from_env()).await
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn bytes_path(&self, file_name: &str) -> PathBuf {
        self.config.dir.join(file_name)
    }

    async fn read_all(&self) -> StoreResult<Vec<ArtifactRecord>> {
        let contents = match fs::read_to_string(self.config.index_path()).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ArtifactRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_no + 1, "Skipping unreadable gallery entry: {}", e),
            }
        }
        Ok(records)
    }

    async fn rewrite(&self, records: &[ArtifactRecord]) -> StoreResult<()> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let index = self.config.index_path();
        let tmp = index.with_extension("jsonl.tmp");
        fs::write(&tmp, &buf).await?;
        fs::rename(&tmp, &index).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for JsonlArtifactStore {
    async fn record(
        &self,
        artifact: &Artifact,
        origin: &ArtifactOrigin,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord> {
        let record = ArtifactRecord::new(artifact, origin, created_at);
        let file_name = format!("{}.{}", record.id, artifact.file_extension());
        let record = record.with_location(file_name.clone());

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;

        fs::write(self.bytes_path(&file_name), &artifact.bytes)
            .await
            .map_err(|e| StoreError::write_failed(format!("{}: {}", file_name, e)))?;

        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.index_path())
            .await?;
        index.write_all(&line).await?;
        index.flush().await?;

        debug!(
            record_id = %record.id,
            kind = %record.kind,
            bytes = record.byte_len,
            "Recorded artifact"
        );
        Ok(record)
    }

    async fn list(&self, query: &GalleryQuery) -> StoreResult<Vec<ArtifactRecord>> {
        let _guard = self.lock.lock().await;
        Ok(query.apply(self.read_all().await?))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<ArtifactRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_iter().find(|r| r.id == id))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_all().await?;
        let Some(pos) = records.iter().position(|r| r.id == id) else {
            return Err(StoreError::not_found(id));
        };
        let removed = records.remove(pos);

        self.rewrite(&records)
            .await
            .map_err(|e| StoreError::delete_failed(format!("{}: {}", id, e)))?;

        if let Some(location) = removed.location {
            if let Err(e) = fs::remove_file(self.bytes_path(&location)).await {
                warn!(record_id = %id, "Failed to remove artifact file: {}", e);
            }
        }

        info!(record_id = %id, "Deleted artifact");
        Ok(())
    }

    async fn load_bytes(&self, id: &str) -> StoreResult<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;

        let Some(location) = self
            .read_all()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .and_then(|r| r.location)
        else {
            return Ok(None);
        };

        match fs::read(self.bytes_path(&location)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
