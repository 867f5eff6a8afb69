//! skimgrid-dispatch — the dispatch engine.
//!
//! Spreads a requested thread count across capacity-constrained workers and
//! picks a per-job launch delay so every job *completes* at the caller's
//! landing instant, regardless of which worker runs it. Capacity decides
//! how many threads land; it never decides when.

pub mod engine;

pub use engine::{dispatch_to_end, ReservePolicy};
