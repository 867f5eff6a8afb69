//! skimgrid-scheduler — from batch plans to a running control loop.
//!
//! The layering, bottom up:
//!
//! - **`batch`** — one self-contained four-leg batch with staggered landings
//! - **`pipeline`** — keep several batches in flight per target
//! - **`prep`** — single corrective operations for unprepped targets
//! - **`access`** — unlock-tool application and privilege escalation
//! - **`cooldown`** — the alternate throttling policy
//! - **`control`** — the per-tick driver and its tokio run loop
//!
//! Ordering between a batch's legs comes entirely from computed launch
//! delays against a shared landing instant — no cross-worker coordination,
//! no blocking waits, no cancellation.

pub mod access;
pub mod batch;
pub mod control;
pub mod cooldown;
pub mod pipeline;
pub mod prep;

pub use access::try_gain_access;
pub use batch::schedule_batch;
pub use control::{ControlLoop, TickReport};
pub use cooldown::assign_ops;
pub use pipeline::fill_pipeline;
pub use prep::run_prep_step;
