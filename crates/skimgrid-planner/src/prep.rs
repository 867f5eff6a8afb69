//! Prep sizing — single corrective operations that drive a target toward
//! the prepped threshold.

use skim_core::{TargetSnapshot, GROW_DEFENSE_COST, WEAKEN_REDUCTION};
use skim_world::World;

/// Whether the target is within tolerance of its ideal state: defense at
/// most `security_buffer` above minimum and funds at least
/// `funding_threshold` of max.
pub fn is_prepped(target: &TargetSnapshot, security_buffer: f64, funding_threshold: f64) -> bool {
    let defense_good = target.metrics.defense <= target.identity.min_defense + security_buffer;
    let funds_good = target.metrics.funds >= target.identity.max_funds * funding_threshold;
    defense_good && funds_good
}

/// Weaken threads to bring defense all the way down to minimum.
pub fn weaken_down_threads(target: &TargetSnapshot) -> u32 {
    let excess = (target.metrics.defense - target.identity.min_defense).max(0.0);
    ((excess / WEAKEN_REDUCTION).ceil() as u32).max(1)
}

/// Grow threads to restore funds to max, paired with the weaken threads
/// that cancel the growth's defense rise.
pub fn grow_restore_plan<W: World + ?Sized>(world: &W, target: &TargetSnapshot) -> (u32, u32) {
    let funds = target.metrics.funds.max(1.0);
    let multiplier = (target.identity.max_funds / funds).max(1.0);

    let raw = world.growth_threads_for(target.id(), multiplier).ceil();
    let grow_threads = if raw.is_finite() && raw >= 1.0 {
        raw as u32
    } else {
        1
    };
    let offset_weaken =
        ((f64::from(grow_threads) * GROW_DEFENSE_COST / WEAKEN_REDUCTION).ceil() as u32).max(1);
    (grow_threads, offset_weaken)
}
