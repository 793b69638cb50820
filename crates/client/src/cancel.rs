//! Cancellation plumbing shared by submission and polling.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;

/// Drive `fut` to completion unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<T, GenerationError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    let Some(cancel) = cancel else {
        return fut.await;
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        result = fut => result,
    }
}

/// Fail fast when `cancel` has already fired.
pub(crate) fn ensure_not_cancelled(
    cancel: Option<&CancellationToken>,
) -> Result<(), GenerationError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(GenerationError::Cancelled),
        _ => Ok(()),
    }
}
