//! Known provider models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Veo video models known to the studio.
///
/// Requests carry the model id as a string, so ids outside this list are
/// still accepted and passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum VeoModel {
    #[default]
    #[serde(rename = "veo-3.0-generate-preview")]
    Veo3,
    #[serde(rename = "veo-3.0-fast-generate-preview")]
    Veo3Fast,
    #[serde(rename = "veo-3.1-generate-preview")]
    Veo31,
    #[serde(rename = "veo-3.1-fast-generate-preview")]
    Veo31Fast,
    #[serde(rename = "veo-2.0-generate-001")]
    Veo2,
}

impl VeoModel {
    /// Model ID for API communication
    pub fn id(&self) -> &'static str {
        match self {
            Self::Veo3 => "veo-3.0-generate-preview",
            Self::Veo3Fast => "veo-3.0-fast-generate-preview",
            Self::Veo31 => "veo-3.1-generate-preview",
            Self::Veo31Fast => "veo-3.1-fast-generate-preview",
            Self::Veo2 => "veo-2.0-generate-001",
        }
    }

    /// Model name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Veo3 => "Veo 3",
            Self::Veo3Fast => "Veo 3 Fast",
            Self::Veo31 => "Veo 3.1",
            Self::Veo31Fast => "Veo 3.1 Fast",
            Self::Veo2 => "Veo 2",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|m| m.id() == id)
    }

    pub fn supports_resolution(&self) -> bool {
        Self::id_supports_resolution(self.id())
    }

    /// Only Veo 3.1 and Veo 2 accept an explicit output resolution.
    pub fn id_supports_resolution(id: &str) -> bool {
        id.contains("veo-3.1") || id.contains("veo-2")
    }

    /// All available models
    pub fn all() -> [VeoModel; 5] {
        [
            Self::Veo3,
            Self::Veo3Fast,
            Self::Veo31,
            Self::Veo31Fast,
            Self::Veo2,
        ]
    }
}

/// Image models used for still generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ImageModel {
    #[default]
    #[serde(rename = "imagen-4.0-generate-001")]
    Imagen4,
    #[serde(rename = "imagen-3.0-generate-002")]
    Imagen3,
}

impl ImageModel {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Imagen4 => "imagen-4.0-generate-001",
            Self::Imagen3 => "imagen-3.0-generate-002",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_round_trip() {
        for model in VeoModel::all() {
            assert_eq!(VeoModel::from_id(model.id()), Some(model));
        }
        assert_eq!(VeoModel::from_id("unknown"), None);
    }

    #[test]
    fn test_resolution_support() {
        assert!(VeoModel::Veo31.supports_resolution());
        assert!(VeoModel::Veo2.supports_resolution());
        assert!(!VeoModel::Veo3.supports_resolution());
        assert!(!VeoModel::Veo3Fast.supports_resolution());
    }

    #[test]
    fn test_default_model() {
        assert_eq!(VeoModel::default().id(), "veo-3.0-generate-preview");
    }
}
