//! Batch sizing for one self-contained four-leg batch.
//!
//! Each batch re-derives its thread counts from the *current* snapshot
//! rather than a projected future state. Overlapping in-flight batches may
//! slightly over- or under-correct, but every batch restores the target to
//! a complete state on its own, which is what makes pipelining safe.

use skim_core::{
    BatchPlan, TargetSnapshot, GROW_DEFENSE_COST, HACK_DEFENSE_COST, WEAKEN_REDUCTION,
};
use skim_world::World;

const STEAL_FRACTION_MIN: f64 = 0.001;
const STEAL_FRACTION_MAX: f64 = 0.99;

/// Size the four legs of a batch that steals `steal_fraction` of the
/// target's current funds and leaves defense and funds fully restored.
pub fn plan_batch<W: World + ?Sized>(
    world: &W,
    target: &TargetSnapshot,
    steal_fraction: f64,
) -> BatchPlan {
    let funds = target.metrics.funds.max(1.0);
    let max_funds = target.identity.max_funds.max(1.0);

    let fraction = steal_fraction.clamp(STEAL_FRACTION_MIN, STEAL_FRACTION_MAX);
    let steal_amount = (funds * fraction).floor().max(1.0);
    let hack_threads = clamp_threads(world.extract_threads_for(target.id(), steal_amount).floor());

    // Estimate funds left after the hack leg lands, then grow back to max.
    let per_thread = world.per_thread_yield(target.id());
    let after_hack = (funds - (funds * per_thread * f64::from(hack_threads)).floor()).max(1.0);
    let grow_multiplier = (max_funds / after_hack).max(1.0);
    let grow_threads =
        clamp_threads(world.growth_threads_for(target.id(), grow_multiplier).ceil());

    // Two weaken legs, each canceling one leg's defense rise independently.
    let weaken_hack = weaken_to_offset(f64::from(hack_threads) * HACK_DEFENSE_COST);
    let weaken_grow = weaken_to_offset(f64::from(grow_threads) * GROW_DEFENSE_COST);

    BatchPlan {
        hack_threads,
        grow_threads,
        weaken_hack,
        weaken_grow,
    }
}

/// Threads needed to cancel a defense rise of `defense_delta`.
fn weaken_to_offset(defense_delta: f64) -> u32 {
    clamp_threads((defense_delta / WEAKEN_REDUCTION).ceil())
}

/// Non-finite or sub-1 thread counts become 1: a degenerate batch still
/// makes progress, a zero-leg batch would silently do nothing.
fn clamp_threads(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        1
    } else {
        value as u32
    }
}
