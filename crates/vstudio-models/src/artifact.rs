//! Downloaded artifacts and the records kept for them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{AspectRatio, GenerationMode, GenerationRequest, Resolution};

/// URI of a finished artifact on the provider side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ResultLocator(String);

impl ResultLocator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media type of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a content type; anything not `image/*` is treated as video.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.trim().to_ascii_lowercase().starts_with("image/") {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary payload downloaded for a finished job.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Negotiated content type, e.g. `video/mp4`
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// Where the bytes were fetched from
    pub source: ResultLocator,
}

impl Artifact {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>, source: ResultLocator) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
            source,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_content_type(&self.content_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type.
    pub fn file_extension(&self) -> &'static str {
        let base = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => match self.kind() {
                MediaKind::Image => "png",
                MediaKind::Video => "mp4",
            },
        }
    }
}

// Bytes are elided so multi-megabyte payloads never end up in logs.
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .field("source", &self.source)
            .finish()
    }
}

/// What produced an artifact: the parts of the request worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactOrigin {
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GenerationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl ArtifactOrigin {
    /// Origin of a still image, which has no video mode.
    pub fn image(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            mode: None,
            aspect_ratio: None,
            resolution: None,
        }
    }
}

impl From<&GenerationRequest> for ArtifactOrigin {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            mode: Some(request.mode),
            aspect_ratio: (request.mode != GenerationMode::ExtendVideo)
                .then_some(request.aspect_ratio),
            resolution: request.supports_resolution().then_some(request.resolution),
        }
    }
}

/// Durable entry describing one completed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactRecord {
    /// Unique record ID
    pub id: String,
    pub kind: MediaKind,
    /// Provider locator the bytes were fetched from
    pub source: String,
    /// Local location of the stored bytes, if the store keeps them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub content_type: String,
    pub byte_len: u64,
    #[serde(flatten)]
    pub origin: ArtifactOrigin,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    pub fn new(artifact: &Artifact, origin: &ArtifactOrigin, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: artifact.kind(),
            source: artifact.source.to_string(),
            location: None,
            content_type: artifact.content_type.clone(),
            byte_len: artifact.len() as u64,
            origin: origin.clone(),
            created_at,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Whether this record was made from `artifact`.
    pub fn describes(&self, artifact: &Artifact) -> bool {
        self.source == artifact.source.as_str()
            && self.byte_len == artifact.len() as u64
            && self.content_type == artifact.content_type
    }

    /// Request to generate the same thing again.
    pub fn regenerate_request(&self) -> GenerationRequest {
        GenerationRequest::regenerate(self.origin.prompt.clone(), self.origin.model.clone())
    }

    /// Request continuing this video. `None` for images.
    pub fn extend_request(&self, prompt: impl Into<String>) -> Option<GenerationRequest> {
        (self.kind == MediaKind::Video).then(|| {
            GenerationRequest::extend_video(
                prompt,
                self.origin.model.clone(),
                crate::GeneratedVideo::new(self.source.clone()),
            )
        })
    }
}
