//! Budgeted fleet purchaser.
//!
//! Keeps a fleet of purchased worker nodes growing: buy the largest
//! power-of-two capacity the budget allows while below the fleet limit,
//! then replace the smallest owned node whenever a strictly larger one is
//! affordable.

use std::cmp::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use skim_core::NodeId;

/// The market surface the purchaser needs.
pub trait FleetMarket {
    /// Controller funds available right now.
    fn funds(&self) -> f64;
    fn fleet_limit(&self) -> u32;
    fn max_node_capacity(&self) -> f64;
    /// Owned nodes as `(id, capacity)` pairs.
    fn owned_nodes(&self) -> Vec<(NodeId, f64)>;
    fn node_cost(&self, capacity: f64) -> f64;
    fn purchase(&self, name: &str, capacity: f64) -> bool;
    fn retire(&self, name: &str) -> bool;
}

/// What one purchase pass decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetDecision {
    Buy { name: String, capacity: f64 },
    Replace { victim: String, capacity: f64 },
    Hold,
}

/// Largest power-of-two capacity whose next doubling is out of budget,
/// clamped to the market's node size ceiling. Starts at the minimum node
/// size of 2.
pub fn max_affordable_capacity<M: FleetMarket + ?Sized>(market: &M, budget: f64) -> f64 {
    let mut capacity = 2.0;
    while capacity < market.max_node_capacity() && market.node_cost(capacity * 2.0) < budget {
        capacity *= 2.0;
    }
    capacity
}

/// Decide this pass's action without performing it.
pub fn plan_fleet_step<M: FleetMarket + ?Sized>(market: &M, budget_fraction: f64) -> FleetDecision {
    let budget = market.funds() * budget_fraction;
    let capacity = max_affordable_capacity(market, budget);
    if market.node_cost(capacity) >= budget {
        debug!(budget, "fleet: insufficient funds for any node");
        return FleetDecision::Hold;
    }

    let owned = market.owned_nodes();
    if (owned.len() as u32) < market.fleet_limit() {
        return FleetDecision::Buy {
            name: format!("fleet-{:02}", owned.len()),
            capacity,
        };
    }

    // Fleet is full: replace the smallest node if the candidate beats it.
    let smallest = owned
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    match smallest {
        Some((victim, smallest_capacity)) if capacity > *smallest_capacity => {
            FleetDecision::Replace {
                victim: victim.clone(),
                capacity,
            }
        }
        _ => {
            debug!("fleet: best affordable node is no larger than the smallest owned");
            FleetDecision::Hold
        }
    }
}

/// Plan and execute one purchase pass. Returns the decision taken.
pub fn run_fleet_step<M: FleetMarket + ?Sized>(market: &M, budget_fraction: f64) -> FleetDecision {
    let decision = plan_fleet_step(market, budget_fraction);
    match &decision {
        FleetDecision::Buy { name, capacity } => {
            if market.purchase(name, *capacity) {
                info!(node = %name, capacity, "fleet node purchased");
            } else {
                warn!(node = %name, capacity, "fleet purchase failed");
            }
        }
        FleetDecision::Replace { victim, capacity } => {
            if !market.retire(victim) {
                warn!(node = %victim, "fleet retirement failed");
            } else if market.purchase(victim, *capacity) {
                info!(node = %victim, capacity, "fleet node replaced");
            } else {
                warn!(node = %victim, capacity, "fleet replacement purchase failed");
            }
        }
        FleetDecision::Hold => {}
    }
    decision
}

/// Run purchase passes at a fixed interval until shutdown.
pub async fn run_fleet_loop<M: FleetMarket>(
    market: &M,
    budget_fraction: f64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, "fleet purchaser started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                run_fleet_step(market, budget_fraction);
            }
            _ = shutdown.changed() => {
                info!("fleet purchaser shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skim_world::{SimWorld, UniverseSpec};

    fn market(funds: f64, fleet_limit: u32) -> SimWorld {
        let world = SimWorld::from_universe(UniverseSpec {
            fleet_limit,
            ..UniverseSpec::default()
        });
        world.credit(funds);
        world
    }

    #[test]
    fn affordable_capacity_doubles_within_budget() {
        let world = market(0.0, 25);
        // Cost is 55k per unit: a 10M budget affords cost(128)=7.04M but
        // not cost(256)=14.08M, so doubling stops at 128.
        assert_eq!(max_affordable_capacity(&world, 10_000_000.0), 128.0);
        // A budget below cost(4) stays at the minimum size.
        assert_eq!(max_affordable_capacity(&world, 100_000.0), 2.0);
    }

    #[test]
    fn buys_below_the_fleet_limit() {
        let world = market(50_000_000.0, 25);
        let decision = run_fleet_step(&world, 0.2);
        assert!(matches!(decision, FleetDecision::Buy { .. }));
        assert_eq!(world.owned_fleet().len(), 1);
    }

    #[test]
    fn holds_when_broke() {
        let world = market(100.0, 25);
        assert_eq!(run_fleet_step(&world, 0.2), FleetDecision::Hold);
        assert!(world.owned_fleet().is_empty());
    }

    #[test]
    fn replaces_smallest_when_full_and_richer() {
        let world = market(2_000_000.0, 1);
        // First pass buys a small node (budget 400k → capacity 4).
        let first = run_fleet_step(&world, 0.2);
        assert!(matches!(first, FleetDecision::Buy { capacity, .. } if capacity == 4.0));

        // Wealth grows; the fleet is full, so the smallest is replaced.
        world.credit(100_000_000.0);
        let second = run_fleet_step(&world, 0.2);
        match second {
            FleetDecision::Replace { victim, capacity } => {
                assert_eq!(victim, "fleet-00");
                assert!(capacity > 4.0);
            }
            other => panic!("expected replacement, got {other:?}"),
        }
        let fleet = world.owned_fleet();
        assert_eq!(fleet.len(), 1);
        assert!(fleet[0].1 > 4.0);
    }

    #[test]
    fn holds_when_full_and_candidate_is_no_bigger() {
        let world = market(2_000_000.0, 1);
        run_fleet_step(&world, 0.2);
        // Same wealth: the affordable size hasn't changed.
        let decision = run_fleet_step(&world, 0.2);
        assert_eq!(decision, FleetDecision::Hold);
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let world = market(0.0, 25);
        let (tx, rx) = watch::channel(false);
        let handle = {
            let world = world.clone();
            tokio::spawn(async move {
                run_fleet_loop(&world, 0.2, Duration::from_millis(5), rx).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
