//! In-process job event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`JobEventBus`] implements [`GenerationJobTracker`], so handing it to
//! the orchestrator turns every `enqueue` / `update` / `finalize` into a
//! [`JobEvent`] that any number of subscribers can observe.

use chrono::{DateTime, Utc};
use genjob_core::{GenerationJobTracker, JobStatusSnapshot, NormalizedStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// What happened to a tracked job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    Enqueued {
        prompt: String,
        model: String,
    },
    Updated {
        status: NormalizedStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },
    Finalized,
}

/// A lifecycle event for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    #[serde(flatten)]
    pub kind: JobEventKind,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: impl Into<String>, kind: JobEventKind) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn enqueued(job_id: &str, prompt: &str, model: &str) -> Self {
        Self::new(
            job_id,
            JobEventKind::Enqueued {
                prompt: prompt.to_string(),
                model: model.to_string(),
            },
        )
    }

    pub fn updated(job_id: &str, snapshot: &JobStatusSnapshot) -> Self {
        Self::new(
            job_id,
            JobEventKind::Updated {
                status: snapshot.status,
                progress: snapshot.progress,
                stage: snapshot.stage.clone(),
            },
        )
    }

    pub fn finalized(job_id: &str) -> Self {
        Self::new(job_id, JobEventKind::Finalized)
    }

    /// Short name of the event kind, for logs.
    pub fn name(&self) -> &'static str {
        match self.kind {
            JobEventKind::Enqueued { .. } => "enqueued",
            JobEventKind::Updated { .. } => "updated",
            JobEventKind::Finalized => "finalized",
        }
    }
}

// ---------------------------------------------------------------------------
// JobEventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of [`JobEvent`]s.
///
/// # Usage
///
/// ```rust
/// use genjob_events::bus::{JobEvent, JobEventBus};
///
/// let bus = JobEventBus::default();
/// let _rx = bus.subscribe();
///
/// bus.publish(JobEvent::finalized("job-1"));
/// ```
pub struct JobEventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl GenerationJobTracker for JobEventBus {
    fn enqueue(&self, job_id: &str, prompt: &str, model: &str) {
        self.publish(JobEvent::enqueued(job_id, prompt, model));
    }

    fn update(&self, job_id: &str, snapshot: &JobStatusSnapshot) {
        self.publish(JobEvent::updated(job_id, snapshot));
    }

    fn finalize(&self, job_id: &str) {
        self.publish(JobEvent::finalized(job_id));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
