//! Lifecycle sink for in-flight generation jobs.

use crate::job::JobStatusSnapshot;

/// Receives lifecycle events for jobs that went through the polling path.
///
/// Call order per job: `enqueue` exactly once, then zero or more
/// `update`s, then `finalize` exactly once. `finalize` is delivered on
/// both the success and the failure path. Synchronous results never
/// reach the tracker.
pub trait GenerationJobTracker: Send + Sync {
    fn enqueue(&self, job_id: &str, prompt: &str, model: &str);

    fn update(&self, job_id: &str, snapshot: &JobStatusSnapshot);

    fn finalize(&self, job_id: &str);
}

impl<T: GenerationJobTracker + ?Sized> GenerationJobTracker for std::sync::Arc<T> {
    fn enqueue(&self, job_id: &str, prompt: &str, model: &str) {
        (**self).enqueue(job_id, prompt, model);
    }

    fn update(&self, job_id: &str, snapshot: &JobStatusSnapshot) {
        (**self).update(job_id, snapshot);
    }

    fn finalize(&self, job_id: &str) {
        (**self).finalize(job_id);
    }
}
