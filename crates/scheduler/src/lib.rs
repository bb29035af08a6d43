#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Forge Scheduler
//!
//! The stateless job scheduler (§4.3 of the specification). It owns no
//! state of its own beyond the collaborators handed to it at construction
//! time: a [`forge_core::ports::PipelineDb`] for reads, a
//! [`forge_core::ports::BuildsDb`] for build lifecycle mutation, a
//! [`forge_core::ports::Scanner`] for refreshing resource versions, and a
//! [`forge_core::ports::BuildFactory`]/[`forge_core::ports::Engine`] pair for
//! materialising and running a build once its inputs are known.
//!
//! - [`Scheduler::build_latest_inputs`] — trigger a build from the latest
//!   scanned resource versions, if one doesn't already exist for them.
//! - [`Scheduler::try_next_pending_build`] — advance the next pending build
//!   for a job, determining its inputs if they weren't fixed at enqueue
//!   time.
//! - [`Scheduler::trigger_immediately`] — start a build with no
//!   predetermined inputs, handed off without blocking the caller.
//! - [`transition::can_transition_build`] — the build status state machine
//!   these operations move builds through.

mod scheduler;
pub mod transition;

pub use scheduler::Scheduler;
