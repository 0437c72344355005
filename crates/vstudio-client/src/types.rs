//! Provider request/response wire types.

use serde::{Deserialize, Serialize};
use vstudio_models::{GenerationMode, GenerationRequest, InlineImage};

/// Body of `models/{model}:predictLongRunning`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJobRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Input image, or the start frame for interpolation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<WireImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame: Option<WireImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<WireReferenceImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<WireVideo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

impl From<&InlineImage> for WireImage {
    fn from(image: &InlineImage) -> Self {
        Self {
            bytes_base64_encoded: image.data.clone(),
            mime_type: image.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireReferenceImage {
    pub image: WireImage,
    pub reference_type: ReferenceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Asset,
    Style,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireVideo {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub sample_count: u32,
}

impl VideoJobRequest {
    /// Map a request onto the provider payload, attaching only the inputs
    /// that belong to its mode.
    pub fn from_request(request: &GenerationRequest) -> Self {
        let mut instance = VideoInstance {
            prompt: request.has_prompt().then(|| request.prompt.clone()),
            ..Default::default()
        };

        match request.mode {
            GenerationMode::TextToVideo => {}
            GenerationMode::ImageToVideo => {
                instance.image = request.image.as_ref().map(WireImage::from);
            }
            GenerationMode::FramesToVideo => {
                instance.image = request.start_frame.as_ref().map(WireImage::from);
                instance.last_frame = request.effective_end_frame().map(WireImage::from);
            }
            GenerationMode::ReferencesToVideo => {
                instance.reference_images = request
                    .reference_images
                    .iter()
                    .map(|image| WireReferenceImage {
                        image: image.into(),
                        reference_type: ReferenceType::Asset,
                    })
                    .chain(request.style_image.as_ref().map(|image| WireReferenceImage {
                        image: image.into(),
                        reference_type: ReferenceType::Style,
                    }))
                    .collect();
            }
            GenerationMode::ExtendVideo => {
                instance.video = request.source_video.as_ref().map(|v| WireVideo {
                    uri: v.uri.clone(),
                });
            }
        }

        let parameters = VideoParameters {
            aspect_ratio: (request.mode != GenerationMode::ExtendVideo)
                .then(|| request.aspect_ratio.as_str().to_string()),
            negative_prompt: request.negative_prompt.clone(),
            resolution: request
                .supports_resolution()
                .then(|| request.resolution.as_str().to_string()),
            sample_count: 1,
        };

        Self {
            instances: vec![instance],
            parameters,
        }
    }
}

/// Response to a long-running submit: the operation to poll.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationCreated {
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `models/{model}:predict` for still images.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub instances: Vec<ImageInstance>,
    pub parameters: ImageParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageInstance {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameters {
    pub sample_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub predictions: Vec<ImagePrediction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePrediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstudio_models::{AspectRatio, GeneratedVideo, Resolution};

    fn img(tag: &str) -> InlineImage {
        InlineImage::new(tag, "image/png")
    }

    #[test]
    fn test_text_to_video_payload() {
        let req = GenerationRequest::text_to_video("a sunset", "veo-3.0-generate-preview")
            .with_negative_prompt("blurry");
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();

        assert_eq!(json["instances"][0]["prompt"], "a sunset");
        assert!(json["instances"][0].get("image").is_none());
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
        assert_eq!(json["parameters"]["negativePrompt"], "blurry");
        assert_eq!(json["parameters"]["sampleCount"], 1);
        // veo-3.0 takes no resolution
        assert!(json["parameters"].get("resolution").is_none());
    }

    #[test]
    fn test_resolution_only_for_supporting_models() {
        let req = GenerationRequest::text_to_video("a", "veo-3.1-generate-preview")
            .with_resolution(Resolution::P1080);
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();
        assert_eq!(json["parameters"]["resolution"], "1080p");
    }

    #[test]
    fn test_looping_frames_send_start_as_last_frame() {
        let req = GenerationRequest::frames_to_video("", "veo", Some(img("START")), Some(img("END")), true);
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();
        let instance = &json["instances"][0];

        assert!(instance.get("prompt").is_none());
        assert_eq!(instance["image"]["bytesBase64Encoded"], "START");
        assert_eq!(instance["lastFrame"]["bytesBase64Encoded"], "START");
    }

    #[test]
    fn test_reference_images_with_style() {
        let req = GenerationRequest::references_to_video("a cat", "veo", vec![img("A"), img("B")])
            .with_style_image(img("S"));
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();
        let refs = json["instances"][0]["referenceImages"].as_array().unwrap();

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0]["referenceType"], "asset");
        assert_eq!(refs[2]["referenceType"], "style");
        assert_eq!(refs[2]["image"]["bytesBase64Encoded"], "S");
    }

    #[test]
    fn test_extend_mode_omits_aspect_ratio() {
        let req = GenerationRequest::extend_video("more", "veo", GeneratedVideo::new("https://v"))
            .with_aspect_ratio(AspectRatio::Portrait);
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();

        assert_eq!(json["instances"][0]["video"]["uri"], "https://v");
        assert!(json["parameters"].get("aspectRatio").is_none());
    }

    #[test]
    fn test_inputs_outside_mode_are_dropped() {
        let mut req = GenerationRequest::text_to_video("a", "veo");
        req.image = Some(img("STRAY"));
        let json = serde_json::to_value(VideoJobRequest::from_request(&req)).unwrap();
        assert!(json["instances"][0].get("image").is_none());
    }
}
