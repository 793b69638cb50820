//! Submission adapter.

use std::time::Duration;

use genjob_core::types::JsonMap;
use genjob_core::{MediaType, Provider, ProviderJobResponse};
use tokio_util::sync::CancellationToken;

use crate::api::{submission_path, JobTransport};
use crate::cancel::{cancellable, ensure_not_cancelled};
use crate::error::GenerationError;

/// Send one generation request to `POST /api/{media_type}/{provider}`.
///
/// The job id and raw status are sniffed from the loosely-shaped
/// response; the full body is returned as `payload` so callers can read
/// provider-specific fields (inline base64 images and the like).
/// Non-2xx responses surface as [`GenerationError::Api`]; deciding
/// whether to retry is left to the caller.
pub async fn post_provider_job(
    api: &dyn JobTransport,
    provider: Provider,
    media_type: MediaType,
    body: &JsonMap,
    cancel: Option<&CancellationToken>,
    timeout: Option<Duration>,
) -> Result<ProviderJobResponse, GenerationError> {
    ensure_not_cancelled(cancel)?;

    let path = submission_path(media_type, provider);
    let payload = cancellable(cancel, api.post_json(&path, body, timeout)).await?;
    let response = ProviderJobResponse::from_payload(payload);

    tracing::info!(
        provider = %provider,
        media_type = %media_type,
        job_id = response.job_id.as_deref().unwrap_or("<none>"),
        status = %response.status,
        "Generation request submitted",
    );

    Ok(response)
}
