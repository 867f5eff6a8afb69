//! skimgrid-acquire — auxiliary greedy purchasers.
//!
//! Two independent optimizers that feed the worker pool and the
//! controller's income, neither of which needs the engine's timing
//! discipline:
//!
//! - **`fleet`** — budgeted purchaser of worker nodes: buy the largest
//!   affordable size, replace the smallest node once the fleet is full
//! - **`rig`** — marginal-utility upgrader for the income-rig farm: rank
//!   every possible upgrade by gain per cost, buy the best within budget
//!
//! Each is a pure decision step over a narrow market trait plus a tokio
//! run-loop wrapper; `markets` wires both traits to [`skim_world::SimWorld`].

pub mod fleet;
pub mod markets;
pub mod rig;

pub use fleet::{max_affordable_capacity, plan_fleet_step, run_fleet_loop, run_fleet_step,
    FleetDecision, FleetMarket};
pub use rig::{best_upgrade, estimate_production, run_rig_loop, run_rig_pass, RigFarm,
    RigOption, RigStats, RigUpgrade};
