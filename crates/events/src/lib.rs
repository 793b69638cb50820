//! Job lifecycle events and tracker implementations.
//!
//! - [`JobEventBus`]: publish/subscribe hub backed by
//!   `tokio::sync::broadcast`; publishes a [`JobEvent`] for every tracker
//!   call.
//! - [`JobBoard`]: in-memory view of the jobs currently in flight.

pub mod board;
pub mod bus;

pub use board::{ActiveJob, JobBoard};
pub use bus::{JobEvent, JobEventBus, JobEventKind};
