//! In-memory board of jobs currently in flight.
//!
//! A job appears on `enqueue`, follows every `update`, and disappears on
//! `finalize`. Because the orchestrator finalizes on every exit path, an
//! empty board after a run means no job was left behind.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use genjob_core::{GenerationJobTracker, JobStatusSnapshot, NormalizedStatus};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::bus::{JobEvent, JobEventKind};

/// One job as shown on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    pub job_id: String,
    pub prompt: String,
    pub model: String,
    pub status: NormalizedStatus,
    pub progress: Option<f64>,
    pub stage: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct JobBoard {
    jobs: Mutex<HashMap<String, ActiveJob>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, job_id: &str) -> Option<ActiveJob> {
        self.lock().get(job_id).cloned()
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<ActiveJob> {
        let mut jobs: Vec<_> = self.lock().values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fold one event into the board.
    ///
    /// Updates for jobs the board never saw enqueued are ignored.
    pub fn apply(&self, event: &JobEvent) {
        let mut jobs = self.lock();
        match &event.kind {
            JobEventKind::Enqueued { prompt, model } => {
                jobs.insert(
                    event.job_id.clone(),
                    ActiveJob {
                        job_id: event.job_id.clone(),
                        prompt: prompt.clone(),
                        model: model.clone(),
                        status: NormalizedStatus::Queued,
                        progress: None,
                        stage: None,
                        enqueued_at: event.timestamp,
                        updated_at: event.timestamp,
                    },
                );
            }
            JobEventKind::Updated {
                status,
                progress,
                stage,
            } => {
                let Some(job) = jobs.get_mut(&event.job_id) else {
                    tracing::debug!(job_id = %event.job_id, "Update for unknown job ignored");
                    return;
                };
                job.status = *status;
                if progress.is_some() {
                    job.progress = *progress;
                }
                if stage.is_some() {
                    job.stage = stage.clone();
                }
                job.updated_at = event.timestamp;
            }
            JobEventKind::Finalized => {
                jobs.remove(&event.job_id);
            }
        }
    }

    /// Mirror a bus onto the board until the bus is dropped.
    pub async fn follow(&self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.apply(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Job board lagged, some events were missed");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Job event bus closed, board stops following");
                    break;
                }
            }
        }
    }
}

impl GenerationJobTracker for JobBoard {
    fn enqueue(&self, job_id: &str, prompt: &str, model: &str) {
        self.apply(&JobEvent::enqueued(job_id, prompt, model));
    }

    fn update(&self, job_id: &str, snapshot: &JobStatusSnapshot) {
        self.apply(&JobEvent::updated(job_id, snapshot));
    }

    fn finalize(&self, job_id: &str) {
        self.apply(&JobEvent::finalized(job_id));
    }
}
