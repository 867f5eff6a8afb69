//! Capacity-aware thread placement with land-at-instant delays.

use std::cmp::Ordering;

use tracing::{debug, warn};

use skim_core::{NodeId, OpKind, TimestampMs, WorkerSnapshot};
use skim_world::World;

/// Capacity reservation for the distinguished self node: the controller
/// keeps a slice of its own host free for itself.
#[derive(Debug, Clone)]
pub struct ReservePolicy {
    pub self_node: NodeId,
    /// Usable share of the self node's capacity, in (0, 1].
    pub self_capacity_fraction: f64,
}

impl ReservePolicy {
    pub fn new(self_node: NodeId, self_capacity_fraction: f64) -> Self {
        Self {
            self_node,
            self_capacity_fraction,
        }
    }

    /// No reservation anywhere.
    pub fn none(self_node: NodeId) -> Self {
        Self::new(self_node, 1.0)
    }

    pub fn usable_fraction(&self, worker: &str) -> f64 {
        if worker == self.self_node {
            self.self_capacity_fraction
        } else {
            1.0
        }
    }
}

/// Place up to `total_threads` of `kind` against `target` across `workers`,
/// delaying each job so its fixed-duration execution completes at
/// `landing_ms`. Returns the number of threads actually placed.
///
/// Workers are tried fullest-free-capacity first. A worker is skipped when
/// its payload copy fails or it has no room for a single thread; a rejected
/// dispatch leaves `remaining` untouched so the next worker can cover it.
/// Partial placement is a value, not an error — the caller decides whether
/// a shortfall is acceptable.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_to_end<W: World + ?Sized>(
    world: &W,
    kind: OpKind,
    target: &str,
    alt_effect: bool,
    workers: &[WorkerSnapshot],
    total_threads: u32,
    duration_ms: u64,
    landing_ms: TimestampMs,
    reserve: &ReservePolicy,
) -> u32 {
    if total_threads == 0 {
        return 0;
    }
    let per_thread = world.capacity_per_thread(kind);
    if per_thread <= 0.0 {
        return 0;
    }

    let mut ranked: Vec<&WorkerSnapshot> = workers.iter().collect();
    ranked.sort_by(|a, b| {
        let free_a = a.free_capacity(reserve.usable_fraction(&a.id));
        let free_b = b.free_capacity(reserve.usable_fraction(&b.id));
        free_b.partial_cmp(&free_a).unwrap_or(Ordering::Equal)
    });

    let mut remaining = total_threads;
    for worker in ranked {
        if !world.ensure_payload(kind, &worker.id) {
            continue;
        }
        // Re-read the load immediately before committing threads; the
        // snapshot we sorted on may already be stale.
        let Some(fresh) = world.worker_snapshot(&worker.id) else {
            continue;
        };
        let free = fresh.free_capacity(reserve.usable_fraction(&fresh.id));
        let available = (free / per_thread).floor() as u32;
        if available == 0 {
            continue;
        }
        let use_threads = available.min(remaining);

        // The job completes `duration_ms` after it starts; start it late
        // enough that completion coincides with the landing instant.
        let delay = landing_ms.saturating_sub(duration_ms + world.now_ms());

        if world.dispatch(kind, &worker.id, use_threads, target, alt_effect, delay) {
            debug!(
                %kind,
                worker = %worker.id,
                target,
                threads = use_threads,
                delay,
                "job dispatched"
            );
            remaining -= use_threads;
            if remaining == 0 {
                break;
            }
        }
    }

    if remaining > 0 {
        warn!(
            %kind,
            target,
            requested = total_threads,
            placed = total_threads - remaining,
            "placement shortfall"
        );
    }
    total_threads - remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use skim_world::{NodeSpec, SimWorld, UniverseSpec};

    fn universe(home_capacity: f64, extra_worker_capacity: Option<f64>) -> SimWorld {
        let mut nodes = vec![
            NodeSpec {
                id: "home".to_string(),
                capacity: home_capacity,
                links: vec!["t1".to_string()],
                ..NodeSpec::default()
            },
            NodeSpec {
                id: "t1".to_string(),
                min_defense: 2.0,
                defense: Some(10.0),
                max_funds: 1_000_000.0,
                has_access: true,
                ..NodeSpec::default()
            },
        ];
        if let Some(capacity) = extra_worker_capacity {
            nodes.push(NodeSpec {
                id: "w1".to_string(),
                capacity,
                has_access: true,
                links: vec!["home".to_string()],
                ..NodeSpec::default()
            });
        }
        SimWorld::from_universe(UniverseSpec {
            nodes,
            ..UniverseSpec::default()
        })
    }

    fn workers(world: &SimWorld, ids: &[&str]) -> Vec<skim_core::WorkerSnapshot> {
        ids.iter()
            .map(|id| world.worker_snapshot(id).unwrap())
            .collect()
    }

    #[test]
    fn places_exactly_the_requested_threads() {
        let world = universe(64.0, None);
        let pool = workers(&world, &["home"]);

        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            10,
            4000,
            10_000,
            &ReservePolicy::none("home".to_string()),
        );
        assert_eq!(placed, 10);

        let log = world.dispatch_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].threads, 10);
    }

    #[test]
    fn never_exceeds_worker_capacity() {
        // 8.0 capacity / 1.75 per thread = 4 threads max.
        let world = universe(8.0, None);
        let pool = workers(&world, &["home"]);

        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            100,
            4000,
            10_000,
            &ReservePolicy::none("home".to_string()),
        );
        assert_eq!(placed, 4);
        assert_eq!(world.dispatch_log()[0].threads, 4);
    }

    #[test]
    fn spills_across_workers_fullest_first() {
        let world = universe(8.0, Some(64.0));
        let pool = workers(&world, &["home", "w1"]);

        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            38,
            4000,
            10_000,
            &ReservePolicy::none("home".to_string()),
        );
        // w1 fits 36, home fits 4; 38 requested → w1 fills first.
        assert_eq!(placed, 38);
        let log = world.dispatch_log();
        assert_eq!(log[0].worker, "w1");
        assert_eq!(log[0].threads, 36);
        assert_eq!(log[1].worker, "home");
        assert_eq!(log[1].threads, 2);
    }

    #[test]
    fn zero_workers_places_nothing() {
        let world = universe(64.0, None);
        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &[],
            10,
            4000,
            10_000,
            &ReservePolicy::none("home".to_string()),
        );
        assert_eq!(placed, 0);
    }

    #[test]
    fn delay_makes_completion_coincide_with_landing() {
        let world = universe(64.0, None);
        world.set_now(1_000);
        let pool = workers(&world, &["home"]);

        dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            1,
            4000,
            12_000,
            &ReservePolicy::none("home".to_string()),
        );
        let record = &world.dispatch_log()[0];
        // delay = 12_000 − 4000 − 1_000.
        assert_eq!(record.delay_ms, 7_000);
        assert_eq!(record.landing_ms, 12_000);
    }

    #[test]
    fn late_landing_clamps_delay_to_zero() {
        let world = universe(64.0, None);
        world.set_now(50_000);
        let pool = workers(&world, &["home"]);

        dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            1,
            4000,
            10_000, // already in the past
            &ReservePolicy::none("home".to_string()),
        );
        let record = &world.dispatch_log()[0];
        assert_eq!(record.delay_ms, 0);
        assert_eq!(record.landing_ms, 54_000);
    }

    #[test]
    fn failed_payload_copy_skips_worker_not_pass() {
        let world = universe(8.0, Some(64.0));
        world.set_payload_copy_fails("w1", true);
        let pool = workers(&world, &["home", "w1"]);

        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            4,
            4000,
            10_000,
            &ReservePolicy::none("home".to_string()),
        );
        assert_eq!(placed, 4);
        assert_eq!(world.dispatch_log()[0].worker, "home");
    }

    #[test]
    fn self_reserve_limits_home_threads() {
        let world = universe(35.0, None);
        let pool = workers(&world, &["home"]);

        // Usable = 35 × 0.5 = 17.5 → 10 threads.
        let placed = dispatch_to_end(
            &world,
            OpKind::Weaken,
            "t1",
            false,
            &pool,
            100,
            4000,
            10_000,
            &ReservePolicy::new("home".to_string(), 0.5),
        );
        assert_eq!(placed, 10);
    }

    #[test]
    fn capacity_held_by_earlier_legs_is_seen() {
        let world = universe(8.0, None);
        let pool = workers(&world, &["home"]);
        let reserve = ReservePolicy::none("home".to_string());

        // First leg takes 2 threads (3.5 capacity), leaving 4.5.
        assert_eq!(
            dispatch_to_end(&world, OpKind::Weaken, "t1", false, &pool, 2, 4000, 10_000, &reserve),
            2
        );
        // Second leg re-reads the load: only 2 more threads fit.
        assert_eq!(
            dispatch_to_end(&world, OpKind::Weaken, "t1", false, &pool, 5, 4000, 10_000, &reserve),
            2
        );
    }
}
