//! Shared fixtures for the generation client integration tests.
//!
//! [`ScriptedTransport`] answers from queues instead of the network and
//! counts every request; [`RecordingTracker`] records tracker calls in
//! order.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use genjob_client::{GenerationError, JobTransport};
use genjob_core::types::JsonMap;
use genjob_core::{GenerationJobTracker, JobStatusPayload, JobStatusSnapshot, NormalizedStatus};
use serde_json::Value;

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Unwrap a `json!({...})` literal into a map.
pub fn map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn job(value: Value) -> JobStatusPayload {
    serde_json::from_value(value).expect("valid job payload")
}

pub fn api_error(status: u16) -> GenerationError {
    GenerationError::Api {
        status,
        body: format!("rejected with {status}"),
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// A [`JobTransport`] that replays queued answers.
///
/// Once the job queue runs dry every further status request reports
/// `processing`, which models a job that never finishes.
#[derive(Default)]
pub struct ScriptedTransport {
    posts: Mutex<VecDeque<Result<JsonMap, GenerationError>>>,
    jobs: Mutex<VecDeque<Result<JobStatusPayload, GenerationError>>>,
    posted: Mutex<Vec<(String, JsonMap)>>,
    get_calls: AtomicUsize,
    get_delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(self, response: Value) -> Self {
        self.posts.lock().unwrap().push_back(Ok(map(response)));
        self
    }

    pub fn with_post_error(self, error: GenerationError) -> Self {
        self.posts.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_job(self, payload: Value) -> Self {
        self.jobs.lock().unwrap().push_back(Ok(job(payload)));
        self
    }

    pub fn with_job_error(self, error: GenerationError) -> Self {
        self.jobs.lock().unwrap().push_back(Err(error));
        self
    }

    /// Delay every status response by `delay`.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// `(path, body)` of every submission, in order.
    pub fn posted(&self) -> Vec<(String, JsonMap)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &JsonMap,
        _timeout: Option<Duration>,
    ) -> Result<JsonMap, GenerationError> {
        self.posted
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        self.posts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected submission")
    }

    async fn get_job(
        &self,
        job_id: &str,
        _timeout: Duration,
    ) -> Result<JobStatusPayload, GenerationError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.jobs.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(job(serde_json::json!({
                "id": job_id,
                "status": "processing",
            })))
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    Enqueue {
        job_id: String,
        prompt: String,
        model: String,
    },
    Update {
        job_id: String,
        status: NormalizedStatus,
    },
    Finalize {
        job_id: String,
    },
}

impl TrackerCall {
    pub fn enqueue(job_id: &str, prompt: &str, model: &str) -> Self {
        Self::Enqueue {
            job_id: job_id.into(),
            prompt: prompt.into(),
            model: model.into(),
        }
    }

    pub fn update(job_id: &str, status: NormalizedStatus) -> Self {
        Self::Update {
            job_id: job_id.into(),
            status,
        }
    }

    pub fn finalize(job_id: &str) -> Self {
        Self::Finalize {
            job_id: job_id.into(),
        }
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    calls: Mutex<Vec<TrackerCall>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl GenerationJobTracker for RecordingTracker {
    fn enqueue(&self, job_id: &str, prompt: &str, model: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TrackerCall::enqueue(job_id, prompt, model));
    }

    fn update(&self, job_id: &str, snapshot: &JobStatusSnapshot) {
        self.calls
            .lock()
            .unwrap()
            .push(TrackerCall::update(job_id, snapshot.status));
    }

    fn finalize(&self, job_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TrackerCall::finalize(job_id));
    }
}
