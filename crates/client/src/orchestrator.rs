//! Job orchestrator.
//!
//! [`run_generation_job`] hides the two shapes a provider can answer
//! with (an immediate result, or a job id to poll) behind one call
//! with uniform error semantics:
//!
//! 1. Submit the request.
//! 2. No job id: hand the payload to the immediate parser and return.
//!    The tracker is never involved.
//! 3. Job id: `tracker.enqueue`, poll (forwarding each snapshot to
//!    `tracker.update` and the caller's `on_update`), then
//!    `tracker.finalize` on every exit path, including cancellation
//!    and dropping the future.
//! 4. `failed` becomes [`GenerationError::JobFailed`]; `completed` is
//!    handed to the job parser.

use std::time::Duration;

use genjob_core::types::JsonMap;
use genjob_core::{
    GenerationJobTracker, JobStatusSnapshot, MediaType, NormalizedStatus, Provider,
    ProviderJobResponse,
};
use tokio_util::sync::CancellationToken;

use crate::api::JobTransport;
use crate::error::GenerationError;
use crate::poll::{poll_job_status, PollConfig};
use crate::submit::post_provider_job;

type JobParser<'a, T> = Box<
    dyn FnOnce(&JobStatusSnapshot, &ProviderJobResponse) -> Result<T, GenerationError> + Send + 'a,
>;
type ImmediateParser<'a, T> = Box<dyn FnOnce(&ProviderJobResponse) -> Option<T> + Send + 'a>;
type UpdateHook<'a> = Box<dyn FnMut(&JobStatusSnapshot) + Send + 'a>;

/// Everything one orchestrated generation needs.
pub struct GenerationJob<'a, T> {
    pub provider: Provider,
    pub media_type: MediaType,
    pub body: &'a JsonMap,
    pub tracker: &'a dyn GenerationJobTracker,
    pub prompt: &'a str,
    pub model: &'a str,
    pub cancel: Option<&'a CancellationToken>,
    pub poll: PollConfig,
    /// Timeout for the submission request; `None` uses
    /// `poll.request_timeout`.
    pub submit_timeout: Option<Duration>,
    parse_job_result: JobParser<'a, T>,
    parse_immediate_result: Option<ImmediateParser<'a, T>>,
    on_update: Option<UpdateHook<'a>>,
}

impl<'a, T> GenerationJob<'a, T> {
    pub fn new<P>(
        provider: Provider,
        media_type: MediaType,
        body: &'a JsonMap,
        tracker: &'a dyn GenerationJobTracker,
        prompt: &'a str,
        model: &'a str,
        parse_job_result: P,
    ) -> Self
    where
        P: FnOnce(&JobStatusSnapshot, &ProviderJobResponse) -> Result<T, GenerationError>
            + Send
            + 'a,
    {
        Self {
            provider,
            media_type,
            body,
            tracker,
            prompt,
            model,
            cancel: None,
            poll: PollConfig::default(),
            submit_timeout: None,
            parse_job_result: Box::new(parse_job_result),
            parse_immediate_result: None,
            on_update: None,
        }
    }

    /// Parser for providers that may answer synchronously.
    pub fn with_immediate_parser<P>(mut self, parser: P) -> Self
    where
        P: FnOnce(&ProviderJobResponse) -> Option<T> + Send + 'a,
    {
        self.parse_immediate_result = Some(Box::new(parser));
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = Some(timeout);
        self
    }

    /// Observe every polled snapshot, after the tracker has seen it.
    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&JobStatusSnapshot) + Send + 'a,
    {
        self.on_update = Some(Box::new(hook));
        self
    }
}

/// Result of an orchestrated generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome<T> {
    pub result: T,
    /// `None` when the provider answered synchronously.
    pub job_id: Option<String>,
    /// Terminal snapshot; `None` when the provider answered synchronously.
    pub snapshot: Option<JobStatusSnapshot>,
    pub response: ProviderJobResponse,
}

/// Submit `job.body` and resolve it to a result.
pub async fn run_generation_job<T>(
    api: &dyn JobTransport,
    job: GenerationJob<'_, T>,
) -> Result<GenerationOutcome<T>, GenerationError> {
    let response = post_provider_job(
        api,
        job.provider,
        job.media_type,
        job.body,
        job.cancel,
        Some(job.submit_timeout.unwrap_or(job.poll.request_timeout)),
    )
    .await?;
    resolve_provider_response(api, response, job).await
}

/// Resolve an already-submitted response: return its immediate result
/// or poll its job to completion.
pub async fn resolve_provider_response<T>(
    api: &dyn JobTransport,
    response: ProviderJobResponse,
    job: GenerationJob<'_, T>,
) -> Result<GenerationOutcome<T>, GenerationError> {
    let GenerationJob {
        provider,
        tracker,
        prompt,
        model,
        cancel,
        poll,
        parse_job_result,
        parse_immediate_result,
        mut on_update,
        ..
    } = job;

    let Some(job_id) = response.job_id.clone() else {
        let parse = parse_immediate_result.ok_or(GenerationError::MissingImmediateParser)?;
        let result = parse(&response).ok_or(GenerationError::NoImmediateResult)?;
        tracing::info!(provider = %provider, "Provider returned an immediate result");
        return Ok(GenerationOutcome {
            result,
            job_id: None,
            snapshot: None,
            response,
        });
    };

    tracker.enqueue(&job_id, prompt, model);
    let guard = FinalizeGuard::new(tracker, &job_id);

    let snapshot = poll_job_status(api, &job_id, &poll, cancel, |snapshot| {
        tracker.update(&job_id, snapshot);
        if let Some(hook) = on_update.as_mut() {
            hook(snapshot);
        }
    })
    .await;
    drop(guard);
    let snapshot = snapshot?;

    if snapshot.status == NormalizedStatus::Failed {
        let message = snapshot.job.error_message();
        tracing::warn!(
            provider = %provider,
            job_id = %job_id,
            error = message.as_deref().unwrap_or("<none>"),
            "Generation job failed",
        );
        return Err(GenerationError::job_failed(job_id, message));
    }

    let result = parse_job_result(&snapshot, &response)?;
    Ok(GenerationOutcome {
        result,
        job_id: Some(job_id),
        snapshot: Some(snapshot),
        response,
    })
}

/// Calls `tracker.finalize` exactly once when dropped.
struct FinalizeGuard<'a> {
    tracker: &'a dyn GenerationJobTracker,
    job_id: &'a str,
}

impl<'a> FinalizeGuard<'a> {
    fn new(tracker: &'a dyn GenerationJobTracker, job_id: &'a str) -> Self {
        Self { tracker, job_id }
    }
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        tracing::debug!(job_id = self.job_id, "Finalizing tracked job");
        self.tracker.finalize(self.job_id);
    }
}
