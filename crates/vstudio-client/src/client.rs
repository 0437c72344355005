//! Remote job boundary and its Gemini HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;
use vstudio_models::{Artifact, GenerationRequest, JobHandle, RawStatus, ResultLocator};

use crate::error::{ClientError, ClientResult};
use crate::types::{OperationCreated, VideoJobRequest};

pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// The three remote calls a job tracker drives.
///
/// Implementations hold no per-job state; every call is independent.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Submit a generation job and return its handle.
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<JobHandle>;

    /// Fetch the current status of a job.
    ///
    /// Fails with [`ClientError::NotFound`] when the provider no longer knows
    /// the handle; network and 5xx failures are retryable.
    async fn poll(&self, handle: &JobHandle) -> ClientResult<RawStatus>;

    /// Download the finished artifact.
    async fn fetch_artifact(&self, locator: &ResultLocator) -> ClientResult<Artifact>;
}

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct VeoClientConfig {
    /// API key sent with every call
    pub api_key: String,
    /// Base URL including the API version
    pub base_url: String,
    /// Timeout for submit and poll calls
    pub timeout: Duration,
    /// Timeout for artifact downloads
    pub download_timeout: Duration,
}

impl Default for VeoClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(300), // videos run to tens of MB
        }
    }
}

impl VeoClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("NEXT_PUBLIC_GEMINI_API_KEY"))
                .unwrap_or_default(),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            download_timeout: std::env::var("GEMINI_DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
        }
    }

    /// Set the base URL (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// HTTP client for Veo long-running video jobs.
#[derive(Clone)]
pub struct VeoClient {
    http: Client,
    config: VeoClientConfig,
}

impl VeoClient {
    /// Create a new client. An API key is required.
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

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(VeoClientConfig::from_env())
    }

    pub fn config(&self) -> &VeoClientConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn submit_url(&self, model: &str) -> String {
        format!("{}/models/{}:predictLongRunning", self.base(), model)
    }

    /// URL of an operation; handles are resource names relative to the base.
    pub fn operation_url(&self, handle: &JobHandle) -> String {
        format!("{}/{}", self.base(), handle.as_str().trim_start_matches('/'))
    }

    /// Resolve a locator into a fetchable URL carrying the API key.
    ///
    /// Locators sometimes arrive percent-encoded; they are decoded first.
    pub fn download_url(&self, locator: &ResultLocator) -> ClientResult<Url> {
        let decoded = urlencoding::decode(locator.as_str())
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", locator, e)))?;
        let mut url = Url::parse(&decoded)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", locator, e)))?;

        if !url.query_pairs().any(|(k, _)| k == "key") {
            url.query_pairs_mut().append_pair("key", &self.config.api_key);
        }
        Ok(url)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_http_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl RemoteJobClient for VeoClient {
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<JobHandle> {
        request
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let url = self.submit_url(&request.model);
        let body = VideoJobRequest::from_request(request);

        debug!(mode = %request.mode, model = %request.model, "Submitting video job to {}", url);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let created: OperationCreated = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(format!("submit response: {}", e)))?;

        match created.name {
            Some(name) if !name.is_empty() => Ok(JobHandle::new(name)),
            _ => Err(ClientError::invalid_response(
                "submit response carried no operation name",
            )),
        }
    }

    async fn poll(&self, handle: &JobHandle) -> ClientResult<RawStatus> {
        let url = self.operation_url(handle);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(job_handle = %handle, "Unparseable poll response: {}", e);
            ClientError::invalid_response(format!("poll response: {}", e))
        })
    }

    async fn fetch_artifact(&self, locator: &ResultLocator) -> ClientResult<Artifact> {
        let url = self.download_url(locator)?;

        debug!(locator = %locator, "Downloading artifact");

        let response = self
            .http
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ClientError::invalid_response("artifact download was empty"));
        }

        Ok(Artifact::new(content_type, bytes.to_vec(), locator.clone()))
    }
}
