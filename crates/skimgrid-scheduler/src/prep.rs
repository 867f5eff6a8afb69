//! Prep controller — single corrective dispatches toward the prepped state.

use tracing::debug;

use skim_core::{EngineConfig, OpKind, WorkerSnapshot};
use skim_world::World;
use skimgrid_dispatch::{dispatch_to_end, ReservePolicy};
use skimgrid_planner::{grow_restore_plan, weaken_down_threads};

/// Run one corrective action against an unprepped target: weaken down when
/// defense is high, otherwise grow back up with an offsetting weaken. Both
/// land near-immediately — prep has no overlap logic to protect.
///
/// Returns true when anything was placed; the target is re-evaluated fresh
/// next tick.
pub fn run_prep_step<W: World + ?Sized>(
    world: &W,
    target: &str,
    workers: &[WorkerSnapshot],
    engine: &EngineConfig,
    reserve: &ReservePolicy,
) -> bool {
    let Some(snapshot) = world.target_snapshot(target) else {
        return false;
    };
    let weaken_ms = world.op_duration_ms(OpKind::Weaken, target);
    let pad = engine.step_pad_ms;

    if snapshot.metrics.defense > snapshot.identity.min_defense + engine.security_buffer {
        let threads = weaken_down_threads(&snapshot);
        let landing = world.now_ms() + weaken_ms + pad;
        debug!(target, threads, "prep: weakening down");
        let placed = dispatch_to_end(
            world,
            OpKind::Weaken,
            target,
            false,
            workers,
            threads,
            weaken_ms,
            landing,
            reserve,
        );
        return placed > 0;
    }

    if snapshot.metrics.funds < snapshot.identity.max_funds * engine.funding_threshold {
        let (grow_threads, offset_weaken) = grow_restore_plan(world, &snapshot);
        let grow_ms = world.op_duration_ms(OpKind::Grow, target);
        // Grow lands first; the weaken that cancels its defense rise lands
        // one pad later.
        let weaken_landing = world.now_ms() + weaken_ms + pad;
        let grow_landing = weaken_landing - pad;
        debug!(target, grow_threads, offset_weaken, "prep: restoring funds");
        let placed_weaken = dispatch_to_end(
            world,
            OpKind::Weaken,
            target,
            false,
            workers,
            offset_weaken,
            weaken_ms,
            weaken_landing,
            reserve,
        );
        let placed_grow = dispatch_to_end(
            world,
            OpKind::Grow,
            target,
            false,
            workers,
            grow_threads,
            grow_ms,
            grow_landing,
            reserve,
        );
        return placed_weaken + placed_grow > 0;
    }

    false
}
