//! Access escalation — unlock-tool application and privilege escalation.

use tracing::{debug, info};

use skim_core::TargetSnapshot;
use skim_world::World;

/// Try to gain access to a node: apply unlock tools when enough are
/// available, then attempt escalation. Failure is not an error — the
/// control loop simply retries on a later tick, and the node stays out of
/// the eligible sets until access is gained.
pub fn try_gain_access<W: World + ?Sized>(world: &W, target: &TargetSnapshot) -> bool {
    if target.metrics.has_access {
        return true;
    }
    if world.unlock_tools_available() >= target.identity.required_unlocks {
        world.apply_unlock_tools(target.id());
    }
    let gained = world.escalate(target.id());
    if gained {
        info!(node = %target.id(), "gained access");
    } else {
        debug!(
            node = %target.id(),
            required = target.identity.required_unlocks,
            available = world.unlock_tools_available(),
            "escalation failed, retrying next tick"
        );
    }
    gained
}

#[cfg(test)]
mod tests {
    use super::*;
    use skim_world::{NodeSpec, SimWorld, UniverseSpec};

    fn universe(unlock_tools: u32, required_unlocks: u32) -> SimWorld {
        SimWorld::from_universe(UniverseSpec {
            unlock_tools,
            nodes: vec![
                NodeSpec {
                    id: "home".to_string(),
                    capacity: 8.0,
                    links: vec!["locked".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "locked".to_string(),
                    max_funds: 1_000.0,
                    required_unlocks,
                    ..NodeSpec::default()
                },
            ],
            ..UniverseSpec::default()
        })
    }

    #[test]
    fn gains_access_with_enough_tools() {
        let world = universe(3, 2);
        let snap = world.target_snapshot("locked").unwrap();
        assert!(try_gain_access(&world, &snap));
        assert!(world.target_snapshot("locked").unwrap().metrics.has_access);
    }

    #[test]
    fn fails_with_too_few_tools_then_succeeds_later() {
        let world = universe(1, 2);
        let snap = world.target_snapshot("locked").unwrap();
        assert!(!try_gain_access(&world, &snap));

        // More tools become available; the retry succeeds.
        world.set_unlock_tools(2);
        let snap = world.target_snapshot("locked").unwrap();
        assert!(try_gain_access(&world, &snap));
    }

    #[test]
    fn already_accessible_is_a_noop() {
        let world = universe(0, 0);
        let mut snap = world.target_snapshot("locked").unwrap();
        snap.metrics.has_access = true;
        assert!(try_gain_access(&world, &snap));
    }

    #[test]
    fn zero_required_unlocks_escalates_without_tools() {
        let world = universe(0, 0);
        let snap = world.target_snapshot("locked").unwrap();
        assert!(try_gain_access(&world, &snap));
    }
}
