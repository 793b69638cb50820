//! High-level generation client.

use std::sync::Arc;
use std::time::Duration;

use genjob_core::request::GenerationRequest;
use genjob_core::types::JsonMap;
use genjob_core::{
    GenerationJobTracker, JobStatusSnapshot, NormalizedStatus, Provider, ProviderJobResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::{HttpJobApi, JobTransport};
use crate::config::ClientConfig;
use crate::error::GenerationError;
use crate::fallback::FallbackPolicy;
use crate::orchestrator::{resolve_provider_response, GenerationJob, GenerationOutcome};
use crate::parsers::{self, GeneratedAsset};
use crate::poll::PollConfig;
use crate::progress::{BackendUpdate, FinishUpdate, ProgressHandle, ProgressSlot};
use crate::submit::post_provider_job;

type UpdateHook<'a> = Box<dyn FnMut(&JobStatusSnapshot) + Send + 'a>;

/// Per-call knobs for [`GenerationClient::generate`].
#[derive(Default)]
pub struct GenerateOptions<'a> {
    pub cancel: Option<&'a CancellationToken>,
    /// Overrides the client's polling configuration for this call.
    pub poll: Option<PollConfig>,
    /// Progress display to drive. A private slot is used when unset.
    pub progress: Option<&'a mut ProgressSlot>,
    on_update: Option<UpdateHook<'a>>,
}

impl<'a> GenerateOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = Some(poll);
        self
    }

    pub fn with_progress(mut self, slot: &'a mut ProgressSlot) -> Self {
        self.progress = Some(slot);
        self
    }

    /// Observe every polled snapshot.
    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&JobStatusSnapshot) + Send + 'a,
    {
        self.on_update = Some(Box::new(hook));
        self
    }
}

/// Submits generation requests and resolves them to [`GeneratedAsset`]s.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct GenerationClient {
    api: Arc<dyn JobTransport>,
    poll: PollConfig,
    /// `None` bounds submission by the per-request polling timeout.
    submit_timeout: Option<Duration>,
    fallback: FallbackPolicy,
}

impl GenerationClient {
    pub fn new(api: Arc<dyn JobTransport>) -> Self {
        Self {
            api,
            poll: PollConfig::default(),
            submit_timeout: None,
            fallback: FallbackPolicy::default(),
        }
    }

    /// HTTP client against `config.api_url`, authenticated with
    /// `config.api_token` when set.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut api = HttpJobApi::new(&config.api_url);
        if let Some(token) = &config.api_token {
            api = api.with_token(token);
        }
        Self::new(Arc::new(api)).with_poll_config(config.poll)
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = Some(timeout);
        self
    }

    pub fn with_fallback_policy(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Run one generation end to end.
    ///
    /// A progress controller is started in the options' slot (or a
    /// private one) before submission, fed every polled snapshot, and
    /// stopped at `completed`/100 on success or `failed` on error. A
    /// cancelled run leaves the last displayed values in place.
    pub async fn generate(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        tracker: &dyn GenerationJobTracker,
        options: GenerateOptions<'_>,
    ) -> Result<GenerationOutcome<GeneratedAsset>, GenerationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("generation", %run_id, provider = %provider);
        self.generate_in_span(provider, request, tracker, options)
            .instrument(span)
            .await
    }

    async fn generate_in_span(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        tracker: &dyn GenerationJobTracker,
        options: GenerateOptions<'_>,
    ) -> Result<GenerationOutcome<GeneratedAsset>, GenerationError> {
        let GenerateOptions {
            cancel,
            poll,
            progress,
            on_update,
        } = options;
        let poll = poll.unwrap_or(self.poll);

        let mut private_slot = ProgressSlot::new();
        let slot = match progress {
            Some(slot) => slot,
            None => &mut private_slot,
        };
        slot.start(NormalizedStatus::Queued, 0.0);

        let result = self
            .submit_and_resolve(
                provider,
                request,
                tracker,
                cancel,
                poll,
                slot.active(),
                on_update,
            )
            .await;

        let finish = match &result {
            Ok(_) => FinishUpdate {
                status: Some(NormalizedStatus::Completed),
                progress: Some(100.0),
                stage: None,
            },
            Err(e) if e.is_cancelled() => FinishUpdate::default(),
            Err(_) => FinishUpdate {
                status: Some(NormalizedStatus::Failed),
                ..Default::default()
            },
        };
        slot.stop(finish);

        match &result {
            Ok(outcome) => tracing::info!(url = %outcome.result.url, "Generation finished"),
            Err(e) => tracing::warn!(code = e.code(), error = %e, "Generation did not finish"),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_and_resolve(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        tracker: &dyn GenerationJobTracker,
        cancel: Option<&CancellationToken>,
        poll: PollConfig,
        progress: Option<&ProgressHandle>,
        mut on_update: Option<UpdateHook<'_>>,
    ) -> Result<GenerationOutcome<GeneratedAsset>, GenerationError> {
        let submit_timeout = self.submit_timeout.unwrap_or(poll.request_timeout);
        let (request, body, response) =
            self.submit(provider, request, cancel, submit_timeout).await?;

        let job_id = response.job_id.clone();
        if let (Some(handle), Some(id)) = (progress, &job_id) {
            handle.update_with_backend(BackendUpdate {
                status: Some(response.status),
                job_id: Some(id.clone()),
                ..Default::default()
            });
        }

        let mut job = GenerationJob::new(
            provider,
            provider.media_type(),
            &body,
            tracker,
            &request.prompt,
            &request.model,
            |snapshot, response| parsers::parse_job_result(provider, snapshot, response, &request),
        )
        .with_immediate_parser(|response| {
            parsers::parse_immediate_result(provider, response, &request)
        })
        .with_poll_config(poll)
        .on_update(move |snapshot| {
            if let (Some(handle), Some(id)) = (progress, job_id.as_deref()) {
                handle.update_with_backend(BackendUpdate::from_snapshot(id, snapshot));
            }
            if let Some(hook) = on_update.as_mut() {
                hook(snapshot);
            }
        });
        if let Some(cancel) = cancel {
            job = job.with_cancel(cancel);
        }

        resolve_provider_response(self.api.as_ref(), response, job).await
    }

    /// Submit `request`, retrying once with a fallback model when the
    /// policy allows it. Returns the request actually accepted, its
    /// envelope and the provider's response.
    async fn submit(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
        timeout: Duration,
    ) -> Result<(GenerationRequest, JsonMap, ProviderJobResponse), GenerationError> {
        let media_type = provider.media_type();
        let body = request.to_envelope()?;

        let error = match post_provider_job(
            self.api.as_ref(),
            provider,
            media_type,
            &body,
            cancel,
            Some(timeout),
        )
        .await
        {
            Ok(response) => return Ok((request.clone(), body, response)),
            Err(error) => error,
        };

        let Some(fallback) = self.fallback.fallback_for(provider, &request.model, &error) else {
            return Err(error);
        };
        tracing::warn!(
            rejected_model = %request.model,
            fallback_model = fallback,
            error = %error,
            "Model rejected, retrying with fallback",
        );

        let retry = request.with_model(fallback);
        let body = retry.to_envelope()?;
        let response = post_provider_job(
            self.api.as_ref(),
            provider,
            media_type,
            &body,
            cancel,
            Some(timeout),
        )
        .await?;
        Ok((retry, body, response))
    }
}
