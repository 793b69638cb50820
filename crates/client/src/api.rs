//! HTTP surface of the generation backend.
//!
//! [`JobTransport`] is the seam between orchestration and the network:
//! one call to submit a provider request and one to read a job's status
//! document. [`HttpJobApi`] implements it with [`reqwest`]; tests swap
//! in scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use genjob_core::types::JsonMap;
use genjob_core::{JobStatusPayload, MediaType, Provider};

use crate::error::GenerationError;

/// Submission endpoint for a `(media_type, provider)` pair.
pub fn submission_path(media_type: MediaType, provider: Provider) -> String {
    format!("/api/{}/{}", media_type.as_str(), provider.slug())
}

/// Network operations the orchestration layer needs.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// `POST` a JSON body to `path` and return the response object.
    ///
    /// `timeout` bounds this single request when set.
    async fn post_json(
        &self,
        path: &str,
        body: &JsonMap,
        timeout: Option<Duration>,
    ) -> Result<JsonMap, GenerationError>;

    /// Fetch the current status document of a job.
    async fn get_job(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<JobStatusPayload, GenerationError>;
}

/// HTTP client for the generation backend.
#[derive(Clone)]
pub struct HttpJobApi {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl HttpJobApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:3000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Status URL for a job. The id is percent-encoded as a single path
    /// segment.
    pub fn job_url(&self, job_id: &str) -> Result<reqwest::Url, GenerationError> {
        let invalid = || GenerationError::InvalidUrl(self.api_url.clone());
        let mut url = reqwest::Url::parse(&self.api_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["api", "jobs", job_id]);
        Ok(url)
    }

    // ---- private helpers ----

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Pass 2xx responses through. Anything else becomes
    /// [`GenerationError::Api`] carrying the status the model fallback
    /// keys on, plus the backend's body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Decode a 2xx body. Non-JSON bodies surface as
    /// [`GenerationError::Decode`].
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenerationError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request, translating reqwest timeouts into
    /// [`GenerationError::Timeout`].
    async fn send<T: serde::de::DeserializeOwned>(
        request: reqwest::RequestBuilder,
        operation: &'static str,
        timeout: Option<Duration>,
    ) -> Result<T, GenerationError> {
        let request = match timeout {
            Some(t) => request.timeout(t),
            None => request,
        };
        let result = match request.send().await {
            Ok(response) => Self::parse_response(response).await,
            Err(e) => Err(GenerationError::Request(e)),
        };
        match (result, timeout) {
            (Err(GenerationError::Request(e)), Some(after)) if e.is_timeout() => {
                Err(GenerationError::Timeout { operation, after })
            }
            (other, _) => other,
        }
    }
}

#[async_trait]
impl JobTransport for HttpJobApi {
    async fn post_json(
        &self,
        path: &str,
        body: &JsonMap,
        timeout: Option<Duration>,
    ) -> Result<JsonMap, GenerationError> {
        let request = self
            .authorize(self.client.post(format!("{}{path}", self.api_url)))
            .json(body);
        Self::send(request, "Generation request", timeout).await
    }

    async fn get_job(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<JobStatusPayload, GenerationError> {
        let request = self.authorize(self.client.get(self.job_url(job_id)?));
        Self::send(request, "Job status request", Some(timeout)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_path_is_media_then_provider() {
        assert_eq!(
            submission_path(MediaType::Image, Provider::Flux),
            "/api/image/flux"
        );
        assert_eq!(submission_path(MediaType::Video, Provider::Veo), "/api/video/veo");
    }

    #[test]
    fn job_url_embeds_id() {
        let api = HttpJobApi::new("http://localhost:3000");
        assert_eq!(
            api.job_url("job-123").unwrap().as_str(),
            "http://localhost:3000/api/jobs/job-123"
        );
    }

    #[test]
    fn job_url_encodes_reserved_characters() {
        let api = HttpJobApi::new("http://localhost:3000/backend/");
        assert_eq!(
            api.job_url("batch/7?x#y").unwrap().as_str(),
            "http://localhost:3000/backend/api/jobs/batch%2F7%3Fx%23y"
        );
    }

    #[test]
    fn unusable_base_url_is_reported() {
        let api = HttpJobApi::new("not a url");
        let err = api.job_url("job-1").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = HttpJobApi::new("http://localhost:3000/");
        assert_eq!(api.api_url(), "http://localhost:3000");
    }
}
