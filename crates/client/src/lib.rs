//! Generation job orchestration.
//!
//! Submits generation requests to provider endpoints, polls the jobs
//! they create until a terminal status, smooths sparse backend progress
//! into a continuously moving display value, and resolves each run to a
//! typed result or a [`GenerationError`].
//!
//! Layers, lowest first:
//!
//! - [`api`]: the [`JobTransport`] seam and its `reqwest` implementation.
//! - [`submit`]: [`post_provider_job`].
//! - [`poll`]: [`poll_job_status`].
//! - [`progress`]: the progress smoothing controller.
//! - [`orchestrator`]: [`run_generation_job`], unifying synchronous and
//!   job-based responses and driving the tracker.
//! - [`parsers`]: per-provider result extraction.
//! - [`client`]: [`GenerationClient`], which wires all of the above
//!   together with the model fallback policy.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod parsers;
pub mod poll;
pub mod progress;
pub mod submit;

mod cancel;

pub use api::{HttpJobApi, JobTransport};
pub use client::{GenerateOptions, GenerationClient};
pub use config::ClientConfig;
pub use error::GenerationError;
pub use genjob_core::normalize_job_status;
pub use orchestrator::{run_generation_job, GenerationJob, GenerationOutcome};
pub use parsers::GeneratedAsset;
pub use poll::{poll_job_status, PollConfig};
pub use submit::post_provider_job;
