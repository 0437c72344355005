//! Gallery listing: kind filter and sort order.

use serde::{Deserialize, Serialize};
use vstudio_models::{ArtifactRecord, MediaKind};

/// Which kinds of artifacts to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    All,
    Image,
    Video,
}

impl KindFilter {
    pub fn matches(&self, kind: MediaKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Image => kind == MediaKind::Image,
            KindFilter::Video => kind == MediaKind::Video,
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GallerySort {
    #[default]
    Newest,
    Oldest,
    /// Grouped by kind name; insertion order within a group
    Type,
}

/// Parameters for listing stored artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GalleryQuery {
    #[serde(default)]
    pub kind: KindFilter,
    #[serde(default)]
    pub sort: GallerySort,
}

impl GalleryQuery {
    pub fn new(kind: KindFilter, sort: GallerySort) -> Self {
        Self { kind, sort }
    }

    /// Filter and order records. Input is expected in insertion order.
    pub fn apply(&self, records: Vec<ArtifactRecord>) -> Vec<ArtifactRecord> {
        let mut filtered: Vec<_> = records
            .into_iter()
            .filter(|r| self.kind.matches(r.kind))
            .collect();

        match self.sort {
            GallerySort::Newest => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            GallerySort::Oldest => filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            GallerySort::Type => filtered.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str())),
        }

        filtered
    }
}
