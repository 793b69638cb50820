//! Provider result extraction.
//!
//! Each [`Provider`] selects its own ordered list of result-URL
//! strategies (see [`genjob_core::extract`]); the parsers below run that
//! list against a completed job or a synchronous response and attach
//! provenance from the originating request.

use chrono::{DateTime, Utc};
use genjob_core::extract::first_match;
use genjob_core::request::GenerationRequest;
use genjob_core::{JobStatusSnapshot, MediaType, Provider, ProviderJobResponse};
use serde::Serialize;

use crate::error::GenerationError;

/// A resolved generation artifact and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAsset {
    /// Remote URL or `data:` URL of the artifact.
    pub url: String,
    pub media_type: MediaType,
    pub provider: Provider,
    pub prompt: String,
    pub model: String,
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
}

impl GeneratedAsset {
    fn new(
        provider: Provider,
        url: String,
        job_id: Option<String>,
        request: &GenerationRequest,
    ) -> Self {
        Self {
            url,
            media_type: provider.media_type(),
            provider,
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            job_id,
            created_at: Utc::now(),
            owner_id: request.owner_id.clone(),
            avatar_id: request.avatar_id.clone(),
            product_id: request.product_id.clone(),
            style_id: request.style_id.clone(),
        }
    }
}

/// Build the result of a completed job.
///
/// Fails with [`GenerationError::NoResultUrl`] when none of the
/// provider's result fields holds a URL.
pub fn parse_job_result(
    provider: Provider,
    snapshot: &JobStatusSnapshot,
    response: &ProviderJobResponse,
    request: &GenerationRequest,
) -> Result<GeneratedAsset, GenerationError> {
    let job_id = snapshot
        .job
        .id
        .clone()
        .or_else(|| response.job_id.clone())
        .unwrap_or_default();

    let url = first_match(provider.job_result_strategies(), &snapshot.job.to_map())
        .ok_or_else(|| GenerationError::NoResultUrl {
            job_id: job_id.clone(),
        })?;

    Ok(GeneratedAsset::new(provider, url, Some(job_id), request))
}

/// Build the result of a synchronous response, if it carries one.
pub fn parse_immediate_result(
    provider: Provider,
    response: &ProviderJobResponse,
    request: &GenerationRequest,
) -> Option<GeneratedAsset> {
    let url = first_match(provider.immediate_result_strategies(), &response.payload)?;
    Some(GeneratedAsset::new(provider, url, None, request))
}
