//! Job task execution -- the lifecycle of a single run.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state and store writes for one run
//! - [`orchestration`] - Top-level run lifecycle and failure recording
//! - [`verification`] - Locating the file the engine produced

mod context;
mod orchestration;
mod verification;


pub(crate) use context::JobTaskContext;
pub(crate) use orchestration::run_job_task;
