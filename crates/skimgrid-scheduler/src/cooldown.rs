//! Alternate exploitation policy: persistent per-target cooldown throttling.
//!
//! Lower fidelity than the landing-time pipeline — operations land
//! near-immediately and at most one kind is dispatched per target per tick,
//! gated by an explicit [`Cooldowns`] value. The control loop owns the
//! cooldown map, hands a copy in, and stores the returned value back, so
//! no mutable state hides inside shared objects.

use tracing::debug;

use skim_core::{Cooldowns, EngineConfig, OpKind, WorkerSnapshot};
use skim_world::World;
use skimgrid_dispatch::{dispatch_to_end, ReservePolicy};
use skimgrid_planner::{grow_restore_plan, plan_batch, weaken_down_threads};

/// Dispatch at most one operation for the target under the cooldown
/// policy and return the updated cooldown state.
///
/// Priority: weaken while defense is out of tolerance, then grow while
/// funds are short, then hack. A kind's cooldown is armed to its landing
/// instant, so the next dispatch of that kind waits for the effect to
/// arrive.
pub fn assign_ops<W: World + ?Sized>(
    world: &W,
    target: &str,
    workers: &[WorkerSnapshot],
    engine: &EngineConfig,
    reserve: &ReservePolicy,
    mut cooldowns: Cooldowns,
) -> Cooldowns {
    let Some(snapshot) = world.target_snapshot(target) else {
        return cooldowns;
    };
    let now = world.now_ms();

    let needs_weaken =
        snapshot.metrics.defense > snapshot.identity.min_defense + engine.security_buffer;
    let needs_grow =
        snapshot.metrics.funds < snapshot.identity.max_funds * engine.funding_threshold;

    let (kind, threads) = if needs_weaken {
        (OpKind::Weaken, weaken_down_threads(&snapshot))
    } else if needs_grow {
        (OpKind::Grow, grow_restore_plan(world, &snapshot).0)
    } else {
        (
            OpKind::Hack,
            plan_batch(world, &snapshot, engine.steal_fraction).hack_threads,
        )
    };

    if !cooldowns.ready(kind, now) {
        return cooldowns;
    }

    let duration = world.op_duration_ms(kind, target);
    let landing = now + duration + engine.step_pad_ms;
    let placed = dispatch_to_end(
        world, kind, target, false, workers, threads, duration, landing, reserve,
    );
    if placed > 0 {
        cooldowns.arm(kind, landing);
        debug!(target, %kind, threads = placed, until = landing, "cooldown op dispatched");
    }
    cooldowns
}

#[cfg(test)]
mod tests {
    use super::*;
    use skim_world::{NodeSpec, SimWorld, UniverseSpec};

    fn universe(defense: f64, funds: f64) -> SimWorld {
        SimWorld::from_universe(UniverseSpec {
            nodes: vec![
                NodeSpec {
                    id: "home".to_string(),
                    capacity: 4096.0,
                    links: vec!["t1".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "t1".to_string(),
                    min_defense: 2.0,
                    defense: Some(defense),
                    max_funds: 1_000_000.0,
                    funds: Some(funds),
                    has_access: true,
                    ..NodeSpec::default()
                },
            ],
            ..UniverseSpec::default()
        })
    }

    fn pool(world: &SimWorld) -> Vec<skim_core::WorkerSnapshot> {
        vec![world.worker_snapshot("home").unwrap()]
    }

    #[test]
    fn weaken_takes_priority_and_arms_its_cooldown() {
        let world = universe(20.0, 1_000_000.0);
        let engine = EngineConfig::default();
        let reserve = ReservePolicy::none("home".to_string());

        let cd = assign_ops(&world, "t1", &pool(&world), &engine, &reserve, Cooldowns::default());
        let log = world.dispatch_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, OpKind::Weaken);
        // Armed until the weaken lands.
        assert_eq!(cd.weaken, 4000 + engine.step_pad_ms);
        assert_eq!(cd.grow, 0);
    }

    #[test]
    fn armed_cooldown_blocks_redispatch() {
        let world = universe(20.0, 1_000_000.0);
        let engine = EngineConfig::default();
        let reserve = ReservePolicy::none("home".to_string());

        let cd = assign_ops(&world, "t1", &pool(&world), &engine, &reserve, Cooldowns::default());
        let cd_again = assign_ops(&world, "t1", &pool(&world), &engine, &reserve, cd);

        assert_eq!(world.dispatch_log().len(), 1);
        assert_eq!(cd, cd_again);
    }

    #[test]
    fn cooldown_expiry_allows_redispatch() {
        let world = universe(20.0, 1_000_000.0);
        let engine = EngineConfig::default();
        let reserve = ReservePolicy::none("home".to_string());

        let cd = assign_ops(&world, "t1", &pool(&world), &engine, &reserve, Cooldowns::default());
        world.advance_to(cd.weaken);
        // The first weaken landed; defense is within tolerance now, so the
        // next assignment moves on to hack (funds are full).
        let cd = assign_ops(&world, "t1", &pool(&world), &engine, &reserve, cd);
        assert_eq!(cd.hack, cd.weaken + 1000 + engine.step_pad_ms);
    }

    #[test]
    fn prepped_target_hacks() {
        let world = universe(2.0, 1_000_000.0);
        let engine = EngineConfig::default();
        let reserve = ReservePolicy::none("home".to_string());

        assign_ops(&world, "t1", &pool(&world), &engine, &reserve, Cooldowns::default());
        let log = world.dispatch_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, OpKind::Hack);
        assert_eq!(log[0].threads, 40);
    }

    #[test]
    fn low_funds_grows() {
        let world = universe(2.0, 200_000.0);
        let engine = EngineConfig::default();
        let reserve = ReservePolicy::none("home".to_string());

        assign_ops(&world, "t1", &pool(&world), &engine, &reserve, Cooldowns::default());
        assert_eq!(world.dispatch_log()[0].kind, OpKind::Grow);
    }
}
