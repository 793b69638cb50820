//! Provider status vocabulary normalization.
//!
//! Every provider reports job state with its own words (`SUCCEEDED`,
//! `running`, `IN_PROGRESS`, ...). [`normalize_job_status`] folds them
//! into the four-state [`NormalizedStatus`] used everywhere else.

use serde::{Deserialize, Serialize};

/// Raw statuses meaning the job is waiting to start.
const QUEUED_STATUSES: &[&str] = &["PENDING", "QUEUED", "SCHEDULED", "SUBMITTED"];
/// Raw statuses meaning the job is running.
const PROCESSING_STATUSES: &[&str] =
    &["PROCESSING", "RUNNING", "IN_PROGRESS", "STARTED", "EXECUTING"];
/// Raw statuses meaning the job finished successfully.
const COMPLETED_STATUSES: &[&str] = &["COMPLETED", "SUCCEEDED", "DONE", "FINISHED", "SUCCESS"];

/// Lifecycle state of a generation job, independent of provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl NormalizedStatus {
    /// `true` for `Completed` and `Failed`. A terminal job never
    /// transitions again.
    pub fn is_terminal(self) -> bool {
        matches!(self, NormalizedStatus::Completed | NormalizedStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NormalizedStatus::Queued => "queued",
            NormalizedStatus::Processing => "processing",
            NormalizedStatus::Completed => "completed",
            NormalizedStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an arbitrary provider status string to a [`NormalizedStatus`].
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// A missing (or blank) status is treated as `Queued`; a present but
/// unrecognized status is treated as `Failed` so that an unknown
/// provider state cannot keep a job "running" forever.
pub fn normalize_job_status(raw: Option<&str>) -> NormalizedStatus {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NormalizedStatus::Queued;
    };
    let upper = raw.to_ascii_uppercase();
    let upper = upper.as_str();

    if QUEUED_STATUSES.contains(&upper) {
        NormalizedStatus::Queued
    } else if PROCESSING_STATUSES.contains(&upper) {
        NormalizedStatus::Processing
    } else if COMPLETED_STATUSES.contains(&upper) {
        NormalizedStatus::Completed
    } else {
        NormalizedStatus::Failed
    }
}
