//! Job status polling loop.
//!
//! [`poll_job_status`] queries a job until it reaches a terminal status,
//! emitting a [`JobStatusSnapshot`] after every query. The loop honours
//! a [`CancellationToken`] (including while sleeping between polls), a
//! per-request timeout and an overall lifecycle timeout.

use std::time::Duration;

use genjob_core::JobStatusSnapshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::JobTransport;
use crate::cancel::cancellable;
use crate::error::GenerationError;

/// Delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_000);
/// Upper bound on a single status request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(45_000);
/// Upper bound on the whole polling lifecycle.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Timing parameters for [`poll_job_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Overall timeout, measured from the first query.
    pub timeout: Duration,
    /// Timeout applied to each individual request. Submission uses it too
    /// unless the caller sets its own.
    pub request_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Poll `job_id` until it is `completed` or `failed`.
///
/// `on_update` runs after every query, terminal or not. Returns the
/// terminal snapshot; a `failed` job is returned, not raised. Turning
/// it into an error is the caller's decision.
///
/// Fails with [`GenerationError::Cancelled`] as soon as `cancel` fires
/// (no further requests are issued) and with
/// [`GenerationError::Timeout`] once `config.timeout` has elapsed.
pub async fn poll_job_status<F>(
    api: &dyn JobTransport,
    job_id: &str,
    config: &PollConfig,
    cancel: Option<&CancellationToken>,
    mut on_update: F,
) -> Result<JobStatusSnapshot, GenerationError>
where
    F: FnMut(&JobStatusSnapshot),
{
    let never = CancellationToken::new();
    let cancel = cancel.unwrap_or(&never);
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            tracing::info!(job_id, attempt, "Job polling cancelled");
            return Err(GenerationError::Cancelled);
        }
        if started.elapsed() > config.timeout {
            tracing::warn!(
                job_id,
                attempt,
                timeout_ms = config.timeout.as_millis() as u64,
                "Job polling timed out",
            );
            return Err(GenerationError::Timeout {
                operation: "Job polling",
                after: config.timeout,
            });
        }

        attempt += 1;
        let job =
            cancellable(Some(cancel), api.get_job(job_id, config.request_timeout)).await?;
        let snapshot = JobStatusSnapshot::from_job(job);

        tracing::debug!(
            job_id,
            attempt,
            status = %snapshot.status,
            progress = snapshot.progress,
            stage = snapshot.stage.as_deref(),
            "Polled job status",
        );

        on_update(&snapshot);

        if snapshot.is_terminal() {
            tracing::info!(
                job_id,
                attempt,
                status = %snapshot.status,
                "Job reached terminal status",
            );
            return Ok(snapshot);
        }

        // Wait before the next query, respecting cancellation.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job_id, attempt, "Job polling cancelled");
                return Err(GenerationError::Cancelled);
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.timeout, Duration::from_secs(300));
    }
}
