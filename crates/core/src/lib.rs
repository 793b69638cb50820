//! Provider-agnostic domain types for generation jobs.
//!
//! Everything in this crate is pure: status normalization, the wire
//! shapes of submission and status responses, the ordered field
//! extraction strategies used to sniff loosely-typed payloads, the
//! provider/media tags, and the tracker capability consumed by the
//! orchestration layer in `genjob-client`.

pub mod error;
pub mod extract;
pub mod job;
pub mod provider;
pub mod request;
pub mod status;
pub mod tracker;
pub mod types;

pub use job::{JobStatusPayload, JobStatusSnapshot, ProviderJobResponse};
pub use provider::{MediaType, Provider};
pub use status::{normalize_job_status, NormalizedStatus};
pub use tracker::GenerationJobTracker;
