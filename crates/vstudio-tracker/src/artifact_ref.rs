//! Renderable references to downloaded artifacts.
//!
//! A reference is registered once per completed job and resolves by locator
//! (`artifact://<uuid>`) until released. Release is explicit (`release`) or
//! happens when the last clone is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;
use uuid::Uuid;
use vstudio_models::Artifact;

const SCHEME: &str = "artifact://";

type Entries = HashMap<String, Arc<Artifact>>;

/// Registry of live artifact references.
#[derive(Clone, Default)]
pub struct ArtifactRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact and return the reference owning it.
    pub fn register(&self, artifact: Artifact) -> ArtifactRef {
        let locator = format!("{}{}", SCHEME, Uuid::new_v4());
        let artifact = Arc::new(artifact);
        lock(&self.entries).insert(locator.clone(), Arc::clone(&artifact));

        debug!(locator = %locator, bytes = artifact.len(), "Registered artifact reference");

        ArtifactRef {
            inner: Arc::new(RefInner {
                locator,
                artifact,
                registry: Arc::downgrade(&self.entries),
            }),
        }
    }

    /// Look up a live reference by locator.
    pub fn resolve(&self, locator: &str) -> Option<Arc<Artifact>> {
        lock(&self.entries).get(locator).cloned()
    }

    /// Number of references not yet released.
    pub fn live_count(&self) -> usize {
        lock(&self.entries).len()
    }
}

impl fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

// A poisoned map is still structurally valid; keep serving it.
fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct RefInner {
    locator: String,
    artifact: Arc<Artifact>,
    registry: Weak<Mutex<Entries>>,
}

impl RefInner {
    fn release(&self) -> bool {
        let Some(entries) = self.registry.upgrade() else {
            return false;
        };
        let removed = lock(&entries).remove(&self.locator).is_some();
        if removed {
            debug!(locator = %self.locator, "Released artifact reference");
        }
        removed
    }
}

impl Drop for RefInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to a registered artifact.
///
/// Clones share one registration. `release` revokes the locator for every
/// clone; the bytes stay readable through `artifact()` on handles still held.
#[derive(Clone)]
pub struct ArtifactRef {
    inner: Arc<RefInner>,
}

impl ArtifactRef {
    /// `artifact://<uuid>` locator resolvable through the registry.
    pub fn locator(&self) -> &str {
        &self.inner.locator
    }

    pub fn artifact(&self) -> &Artifact {
        &self.inner.artifact
    }

    pub fn shared(&self) -> Arc<Artifact> {
        Arc::clone(&self.inner.artifact)
    }

    pub fn content_type(&self) -> &str {
        &self.inner.artifact.content_type
    }

    /// Revoke the locator. Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.inner.release()
    }

    pub fn is_released(&self) -> bool {
        match self.inner.registry.upgrade() {
            Some(entries) => !lock(&entries).contains_key(&self.inner.locator),
            None => true,
        }
    }
}

impl PartialEq for ArtifactRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.locator == other.inner.locator
    }
}

impl fmt::Debug for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRef")
            .field("locator", &self.inner.locator)
            .field("artifact", &self.inner.artifact)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstudio_models::ResultLocator;

    fn artifact() -> Artifact {
        Artifact::new("video/mp4", vec![1, 2, 3], ResultLocator::new("https://example/x"))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ArtifactRegistry::new();
        let r = registry.register(artifact());

        assert!(r.locator().starts_with("artifact://"));
        assert_eq!(registry.resolve(r.locator()).unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_explicit_release_revokes_all_clones() {
        let registry = ArtifactRegistry::new();
        let r = registry.register(artifact());
        let clone = r.clone();

        assert!(r.release());
        assert!(!r.release());
        assert!(clone.is_released());
        assert!(registry.resolve(clone.locator()).is_none());
        assert_eq!(clone.artifact().len(), 3);
    }

    #[test]
    fn test_drop_of_last_clone_releases() {
        let registry = ArtifactRegistry::new();
        let r = registry.register(artifact());
        let clone = r.clone();

        drop(r);
        assert_eq!(registry.live_count(), 1);
        drop(clone);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_reference_outliving_registry() {
        let r = {
            let registry = ArtifactRegistry::new();
            registry.register(artifact())
        };
        assert!(r.is_released());
        assert!(!r.release());
    }
}
