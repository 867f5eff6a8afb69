//! skim-core — domain types, environment constants, and configuration.
//!
//! Everything the rest of the workspace agrees on lives here:
//!
//! - **`types`** — operation kinds, worker/target snapshots, batch plans
//! - **`config`** — `skim.toml` parsing, defaults, validation
//! - **`error`** — configuration errors (the engine itself never fails hard)

pub mod config;
pub mod error;
pub mod types;

pub use config::{AcquireConfig, EngineConfig, ExploitPolicy, SkimConfig};
pub use error::ConfigError;
pub use types::{
    BatchPlan, Cooldowns, NodeId, OpKind, TargetIdentity, TargetMetrics, TargetSnapshot,
    TimestampMs, WorkerSnapshot, GROW_DEFENSE_COST, HACK_DEFENSE_COST, WEAKEN_REDUCTION,
};
