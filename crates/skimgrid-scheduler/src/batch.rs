//! One self-contained batch: four legs landing in a fixed relative order.

use tracing::debug;

use skim_core::{OpKind, TimestampMs, WorkerSnapshot};
use skim_world::World;
use skimgrid_dispatch::{dispatch_to_end, ReservePolicy};
use skimgrid_planner::plan_batch;

/// Schedule one batch against `target` whose final leg lands at
/// `landing_ms`.
///
/// Landing order, latest first: the grow-offset weaken at `L`, grow at
/// `L − pad`, the hack-offset weaken at `L − 2·pad`, hack at `L − 3·pad`.
/// Execution therefore runs hack → weaken → grow → weaken, so the defense
/// spike from each funds leg is cleaned before the next leg lands.
///
/// Returns true when any leg placed at least one thread. Legs the worker
/// pool cannot cover degrade to partial placement; the batch stays safe
/// because the next batch re-derives its counts from the then-current
/// snapshot.
pub fn schedule_batch<W: World + ?Sized>(
    world: &W,
    target: &str,
    workers: &[WorkerSnapshot],
    steal_fraction: f64,
    step_pad_ms: u64,
    landing_ms: TimestampMs,
    reserve: &ReservePolicy,
) -> bool {
    let Some(snapshot) = world.target_snapshot(target) else {
        return false;
    };
    let plan = plan_batch(world, &snapshot, steal_fraction);
    debug!(
        target,
        hack = plan.hack_threads,
        grow = plan.grow_threads,
        weaken_hack = plan.weaken_hack,
        weaken_grow = plan.weaken_grow,
        landing_ms,
        "scheduling batch"
    );

    let weaken_ms = world.op_duration_ms(OpKind::Weaken, target);
    let grow_ms = world.op_duration_ms(OpKind::Grow, target);
    let hack_ms = world.op_duration_ms(OpKind::Hack, target);
    let pad = step_pad_ms;

    let mut any = false;
    any |= dispatch_to_end(
        world,
        OpKind::Weaken,
        target,
        false,
        workers,
        plan.weaken_grow,
        weaken_ms,
        landing_ms,
        reserve,
    ) > 0;
    any |= dispatch_to_end(
        world,
        OpKind::Grow,
        target,
        false,
        workers,
        plan.grow_threads,
        grow_ms,
        landing_ms.saturating_sub(pad),
        reserve,
    ) > 0;
    any |= dispatch_to_end(
        world,
        OpKind::Weaken,
        target,
        false,
        workers,
        plan.weaken_hack,
        weaken_ms,
        landing_ms.saturating_sub(2 * pad),
        reserve,
    ) > 0;
    any |= dispatch_to_end(
        world,
        OpKind::Hack,
        target,
        false,
        workers,
        plan.hack_threads,
        hack_ms,
        landing_ms.saturating_sub(3 * pad),
        reserve,
    ) > 0;
    any
}
