use std::time::Duration;

use genjob_core::error::CoreError;

/// Message used when a failed job carries no error text of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed";

/// Errors surfaced by the generation client.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider endpoint returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A single request, or the whole polling lifecycle, ran out of time.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The caller cancelled the generation. Not a business failure.
    #[error("Generation cancelled")]
    Cancelled,

    /// The job reached the `failed` status.
    #[error("{message}")]
    JobFailed { job_id: String, message: String },

    /// The job completed but none of the known result fields held a URL.
    #[error("Job {job_id} completed but no result URL was found")]
    NoResultUrl { job_id: String },

    /// A synchronous response carried nothing the parser could use.
    #[error("Provider response contained no usable result")]
    NoImmediateResult,

    /// The provider answered synchronously but the caller configured no
    /// immediate result parser.
    #[error("Provider returned no job id and no immediate result parser is configured")]
    MissingImmediateParser,

    /// The configured API base URL cannot carry a job path.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// A response body was not the JSON shape expected.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GenerationError {
    /// Build a [`GenerationError::JobFailed`], falling back to
    /// [`GENERIC_FAILURE_MESSAGE`] when the job gave no reason.
    pub fn job_failed(job_id: impl Into<String>, message: Option<String>) -> Self {
        GenerationError::JobFailed {
            job_id: job_id.into(),
            message: message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        }
    }

    /// `true` when the caller cancelled; such errors should not be shown
    /// to the user as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            GenerationError::Timeout { .. } => true,
            GenerationError::Request(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status of an API rejection, if this is one.
    pub fn api_status(&self) -> Option<u16> {
        match self {
            GenerationError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stable machine-readable name for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Request(_) => "TRANSPORT_ERROR",
            GenerationError::Api { .. } => "API_ERROR",
            GenerationError::Timeout { .. } => "TIMEOUT",
            GenerationError::Cancelled => "CANCELLED",
            GenerationError::JobFailed { .. } => "JOB_FAILED",
            GenerationError::NoResultUrl { .. }
            | GenerationError::NoImmediateResult
            | GenerationError::MissingImmediateParser => "PROTOCOL_ERROR",
            GenerationError::InvalidUrl(_) => "CONFIG_ERROR",
            GenerationError::Decode(_) => "DECODE_ERROR",
            GenerationError::Core(_) => "VALIDATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failed_uses_generic_message_when_empty() {
        let err = GenerationError::job_failed("job-1", None);
        assert_eq!(err.to_string(), GENERIC_FAILURE_MESSAGE);
        assert_eq!(err.code(), "JOB_FAILED");

        let err = GenerationError::job_failed("job-1", Some("content policy".into()));
        assert_eq!(err.to_string(), "content policy");
    }

    #[test]
    fn cancellation_is_distinct() {
        assert!(GenerationError::Cancelled.is_cancelled());
        assert!(!GenerationError::NoImmediateResult.is_cancelled());
        assert_eq!(GenerationError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn timeout_message_mentions_duration() {
        let err = GenerationError::Timeout {
            operation: "Job polling",
            after: Duration::from_secs(300),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Job polling timed out after 300000ms");
    }
}
