//! Still-image generation (Imagen). Synchronous: one call returns the bytes.

use base64::Engine;
use reqwest::Client;
use tracing::{debug, info};
use vstudio_models::{Artifact, ImageModel, ResultLocator};

use crate::client::{VeoClientConfig, API_KEY_HEADER};
use crate::error::{ClientError, ClientResult};
use crate::types::{ImageInstance, ImageParameters, ImageRequest, ImageResponse};

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// Client for Imagen `:predict` calls.
#[derive(Clone)]
pub struct ImageClient {
    http: Client,
    config: VeoClientConfig,
}

impl ImageClient {
    pub fn new(config: VeoClientConfig) -> ClientResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::config_error("GEMINI_API_KEY is not set"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(VeoClientConfig::from_env())
    }

    /// Generate one image for `prompt` with the given model id.
    pub async fn generate(&self, prompt: &str, model: &str) -> ClientResult<Artifact> {
        if prompt.trim().is_empty() {
            return Err(ClientError::InvalidRequest("prompt is required".to_string()));
        }

        let url = format!(
            "{}/models/{}:predict",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let body = ImageRequest {
            instances: vec![ImageInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImageParameters { sample_count: 1 },
        };

        debug!(model = %model, "Requesting image from {}", url);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_http_status(status.as_u16(), &body));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(format!("image response: {}", e)))?;

        let prediction = parsed
            .predictions
            .into_iter()
            .find(|p| p.bytes_base64_encoded.as_deref().is_some_and(|b| !b.is_empty()))
            .ok_or_else(|| ClientError::invalid_response("no image bytes in response"))?;

        let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ClientError::invalid_response(format!("image bytes: {}", e)))?;

        info!(model = %model, bytes = bytes.len(), "Image generated");

        Ok(Artifact::new(
            prediction
                .mime_type
                .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string()),
            bytes,
            ResultLocator::new(format!("imagen://{}", model)),
        ))
    }

    /// Generate with the default Imagen model.
    pub async fn generate_default(&self, prompt: &str) -> ClientResult<Artifact> {
        self.generate(prompt, ImageModel::default().id()).await
    }
}
