//! Generation requests and per-mode input validation.

use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::catalog::VeoModel;

/// Which kind of video generation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Prompt only
    #[default]
    TextToVideo,
    /// Prompt plus one input image
    ImageToVideo,
    /// Interpolate between a start frame and an optional end frame
    FramesToVideo,
    /// Prompt conditioned on one or more reference images
    ReferencesToVideo,
    /// Continue a previously generated video
    ExtendVideo,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::TextToVideo => "text_to_video",
            GenerationMode::ImageToVideo => "image_to_video",
            GenerationMode::FramesToVideo => "frames_to_video",
            GenerationMode::ReferencesToVideo => "references_to_video",
            GenerationMode::ExtendVideo => "extend_video",
        }
    }

    /// Label shown in the composer.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::TextToVideo => "Text to Video",
            GenerationMode::ImageToVideo => "Image to Video",
            GenerationMode::FramesToVideo => "Frames to Video",
            GenerationMode::ReferencesToVideo => "References to Video",
            GenerationMode::ExtendVideo => "Extend Video",
        }
    }

    pub fn all() -> [GenerationMode; 5] {
        [
            GenerationMode::TextToVideo,
            GenerationMode::ImageToVideo,
            GenerationMode::FramesToVideo,
            GenerationMode::ReferencesToVideo,
            GenerationMode::ExtendVideo,
        ]
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output aspect ratio supported by the video models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image passed inline with a request (base64 payload plus MIME type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InlineImage {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encode raw image bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    ///
    /// A bare base64 payload (no `data:` prefix) is accepted as `image/png`.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let Some((meta, payload)) = url.split_once(',') else {
            if url.is_empty() {
                return None;
            }
            return Some(Self::new(url, "image/png"));
        };
        if payload.is_empty() {
            return None;
        }
        let mime_type = meta
            .strip_prefix("data:")
            .and_then(|m| m.split(';').next())
            .filter(|m| !m.is_empty())
            .unwrap_or("image/png");
        Some(Self::new(payload, mime_type))
    }

    /// Render back into a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// A video previously produced by the provider, referenced by its URI.
///
/// Extend mode only accepts these, never arbitrary uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedVideo {
    pub uri: String,
}

impl GeneratedVideo {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Request precondition that was not met. No network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} requires a non-empty prompt")]
    MissingPrompt(GenerationMode),

    #[error("image_to_video requires an input image")]
    MissingImage,

    #[error("frames_to_video requires a start frame")]
    MissingStartFrame,

    #[error("references_to_video requires at least one reference image")]
    MissingReferenceImages,

    #[error("extend_video requires a previously generated video")]
    MissingSourceVideo,

    #[error("model id must not be empty")]
    MissingModel,

    #[error("{0} has no image data")]
    EmptyMedia(&'static str),
}

/// Immutable parameter set for one generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    /// Prompt text (may be empty for frame interpolation and extension)
    #[serde(default)]
    pub prompt: String,

    /// Provider model id
    pub model: String,

    /// Active generation mode
    #[serde(default)]
    pub mode: GenerationMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Ignored in extend mode
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    pub resolution: Resolution,

    /// Input image for image-to-video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,

    /// First frame for frames-to-video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<InlineImage>,

    /// Last frame for frames-to-video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<InlineImage>,

    /// Use the start frame as the end frame
    #[serde(default)]
    pub looping: bool,

    /// Asset references for references-to-video
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<InlineImage>,

    /// Style reference for references-to-video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_image: Option<InlineImage>,

    /// Video to continue in extend mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_video: Option<GeneratedVideo>,
}

impl GenerationRequest {
    fn base(mode: GenerationMode, prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            mode,
            negative_prompt: None,
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            image: None,
            start_frame: None,
            end_frame: None,
            looping: false,
            reference_images: Vec::new(),
            style_image: None,
            source_video: None,
        }
    }

    pub fn text_to_video(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self::base(GenerationMode::TextToVideo, prompt, model)
    }

    pub fn image_to_video(
        prompt: impl Into<String>,
        model: impl Into<String>,
        image: InlineImage,
    ) -> Self {
        Self {
            image: Some(image),
            ..Self::base(GenerationMode::ImageToVideo, prompt, model)
        }
    }

    pub fn frames_to_video(
        prompt: impl Into<String>,
        model: impl Into<String>,
        start_frame: Option<InlineImage>,
        end_frame: Option<InlineImage>,
        looping: bool,
    ) -> Self {
        Self {
            start_frame,
            end_frame,
            looping,
            ..Self::base(GenerationMode::FramesToVideo, prompt, model)
        }
    }

    pub fn references_to_video(
        prompt: impl Into<String>,
        model: impl Into<String>,
        reference_images: Vec<InlineImage>,
    ) -> Self {
        Self {
            reference_images,
            ..Self::base(GenerationMode::ReferencesToVideo, prompt, model)
        }
    }

    pub fn extend_video(
        prompt: impl Into<String>,
        model: impl Into<String>,
        source_video: GeneratedVideo,
    ) -> Self {
        Self {
            source_video: Some(source_video),
            ..Self::base(GenerationMode::ExtendVideo, prompt, model)
        }
    }

    /// Same prompt and model as a previous job, as a fresh 16:9 text-to-video request.
    pub fn regenerate(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self::text_to_video(prompt, model).with_aspect_ratio(AspectRatio::Landscape)
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        let negative_prompt = negative_prompt.into();
        self.negative_prompt = (!negative_prompt.trim().is_empty()).then_some(negative_prompt);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_style_image(mut self, style_image: InlineImage) -> Self {
        self.style_image = Some(style_image);
        self
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    /// End frame actually sent: the start frame when looping.
    pub fn effective_end_frame(&self) -> Option<&InlineImage> {
        if self.looping {
            self.start_frame.as_ref()
        } else {
            self.end_frame.as_ref()
        }
    }

    /// Whether the chosen model accepts an explicit resolution.
    pub fn supports_resolution(&self) -> bool {
        VeoModel::id_supports_resolution(&self.model)
    }

    /// Check the mode's minimal-completeness precondition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingModel);
        }

        match self.mode {
            GenerationMode::TextToVideo => {
                if !self.has_prompt() {
                    return Err(ValidationError::MissingPrompt(self.mode));
                }
            }
            GenerationMode::ImageToVideo => {
                if !self.has_prompt() {
                    return Err(ValidationError::MissingPrompt(self.mode));
                }
                match &self.image {
                    None => return Err(ValidationError::MissingImage),
                    Some(image) if image.is_empty() => {
                        return Err(ValidationError::EmptyMedia("image"))
                    }
                    Some(_) => {}
                }
            }
            GenerationMode::FramesToVideo => {
                match &self.start_frame {
                    None => return Err(ValidationError::MissingStartFrame),
                    Some(frame) if frame.is_empty() => {
                        return Err(ValidationError::EmptyMedia("start_frame"))
                    }
                    Some(_) => {}
                }
                if let Some(end) = self.effective_end_frame() {
                    if end.is_empty() {
                        return Err(ValidationError::EmptyMedia("end_frame"));
                    }
                }
            }
            GenerationMode::ReferencesToVideo => {
                if !self.has_prompt() {
                    return Err(ValidationError::MissingPrompt(self.mode));
                }
                if self.reference_images.is_empty() {
                    return Err(ValidationError::MissingReferenceImages);
                }
                if self.reference_images.iter().any(InlineImage::is_empty) {
                    return Err(ValidationError::EmptyMedia("reference_images"));
                }
            }
            GenerationMode::ExtendVideo => match &self.source_video {
                Some(video) if !video.uri.trim().is_empty() => {}
                _ => return Err(ValidationError::MissingSourceVideo),
            },
        }

        Ok(())
    }
}
