//! Marginal-utility rig upgrader.
//!
//! Every possible purchase — one more level, one more ram step, one more
//! core on any rig, or a brand-new rig — is scored by estimated production
//! gain per unit cost; the best one within budget is bought. Repeats until
//! the pass budget runs dry.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The farm surface the upgrader needs.
pub trait RigFarm {
    /// Controller funds available right now.
    fn funds(&self) -> f64;
    fn rig_count(&self) -> u32;
    fn rig(&self, index: u32) -> Option<RigStats>;
    fn level_cost(&self, index: u32) -> Option<f64>;
    fn ram_cost(&self, index: u32) -> Option<f64>;
    fn core_cost(&self, index: u32) -> Option<f64>;
    fn new_rig_cost(&self) -> f64;
    fn upgrade_level(&self, index: u32) -> bool;
    fn upgrade_ram(&self, index: u32) -> bool;
    fn upgrade_core(&self, index: u32) -> bool;
    fn purchase_rig(&self) -> bool;
}

/// Stats of one income rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigStats {
    pub level: u32,
    pub ram: u32,
    pub cores: u32,
}

/// Estimated production rate of a rig with the given stats.
pub fn estimate_production(level: u32, ram: u32, cores: u32) -> f64 {
    level as f64 * 1.035f64.powi(ram as i32 - 1) * (1.0 + (cores as f64 - 1.0) / 5.0)
}

/// One purchasable improvement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RigUpgrade {
    Level(u32),
    Ram(u32),
    Core(u32),
    NewRig,
}

/// A scored purchase option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigOption {
    pub upgrade: RigUpgrade,
    pub cost: f64,
    pub gain: f64,
}

impl RigOption {
    pub fn efficiency(&self) -> f64 {
        self.gain / self.cost
    }
}

/// The single most efficient purchase across the whole farm, budget aside.
pub fn best_upgrade<F: RigFarm + ?Sized>(farm: &F) -> Option<RigOption> {
    let mut best: Option<RigOption> = None;

    for index in 0..farm.rig_count() {
        let Some(stats) = farm.rig(index) else {
            continue;
        };
        let current = estimate_production(stats.level, stats.ram, stats.cores);

        let candidates = [
            farm.level_cost(index).map(|cost| RigOption {
                upgrade: RigUpgrade::Level(index),
                cost,
                gain: estimate_production(stats.level + 1, stats.ram, stats.cores) - current,
            }),
            farm.ram_cost(index).map(|cost| RigOption {
                upgrade: RigUpgrade::Ram(index),
                cost,
                gain: estimate_production(stats.level, stats.ram + 1, stats.cores) - current,
            }),
            farm.core_cost(index).map(|cost| RigOption {
                upgrade: RigUpgrade::Core(index),
                cost,
                gain: estimate_production(stats.level, stats.ram, stats.cores + 1) - current,
            }),
        ];
        for candidate in candidates.into_iter().flatten() {
            consider(&mut best, candidate);
        }
    }

    consider(
        &mut best,
        RigOption {
            upgrade: RigUpgrade::NewRig,
            cost: farm.new_rig_cost(),
            gain: estimate_production(1, 1, 1),
        },
    );
    best
}

fn consider(best: &mut Option<RigOption>, candidate: RigOption) {
    if !(candidate.cost.is_finite() && candidate.cost > 0.0) {
        return;
    }
    let better = match best {
        Some(current) => candidate.efficiency() > current.efficiency(),
        None => true,
    };
    if better {
        *best = Some(candidate);
    }
}

/// Buy the best option if it fits in `budget`; returns the purchase made.
pub fn run_rig_step<F: RigFarm + ?Sized>(farm: &F, budget: f64) -> Option<RigOption> {
    let option = best_upgrade(farm)?;
    if option.cost > budget {
        debug!(cost = option.cost, budget, "rig upgrade out of budget");
        return None;
    }
    let bought = match option.upgrade {
        RigUpgrade::Level(i) => farm.upgrade_level(i),
        RigUpgrade::Ram(i) => farm.upgrade_ram(i),
        RigUpgrade::Core(i) => farm.upgrade_core(i),
        RigUpgrade::NewRig => farm.purchase_rig(),
    };
    if bought {
        debug!(upgrade = ?option.upgrade, cost = option.cost, "rig purchase");
        Some(option)
    } else {
        warn!(upgrade = ?option.upgrade, cost = option.cost, "rig purchase failed");
        None
    }
}

/// Spend one pass's budget (`funds × budget_fraction`) on the most
/// efficient purchases, best first. Returns the number bought.
pub fn run_rig_pass<F: RigFarm + ?Sized>(farm: &F, budget_fraction: f64) -> u32 {
    let mut budget = farm.funds() * budget_fraction;
    let mut bought = 0;
    while let Some(option) = run_rig_step(farm, budget) {
        budget -= option.cost;
        bought += 1;
    }
    if bought > 0 {
        info!(bought, "rig pass complete");
    }
    bought
}

/// Run purchase passes at a fixed interval until shutdown.
pub async fn run_rig_loop<F: RigFarm>(
    farm: &F,
    budget_fraction: f64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, "rig upgrader started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                run_rig_pass(farm, budget_fraction);
            }
            _ = shutdown.changed() => {
                info!("rig upgrader shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::tests_support::farm_with_funds;

    #[test]
    fn production_estimate_shape() {
        let base = estimate_production(1, 1, 1);
        assert_eq!(base, 1.0);
        assert!(estimate_production(2, 1, 1) > base);
        assert!(estimate_production(1, 2, 1) > base);
        assert!(estimate_production(1, 1, 2) > base);
        // Level scales linearly.
        assert_eq!(estimate_production(10, 1, 1), 10.0);
    }

    #[test]
    fn first_purchase_is_a_new_rig() {
        let farm = farm_with_funds(100_000.0);
        let best = best_upgrade(&farm).unwrap();
        assert_eq!(best.upgrade, RigUpgrade::NewRig);
    }

    #[test]
    fn level_upgrade_beats_the_rest_on_a_fresh_rig() {
        let farm = farm_with_funds(100_000.0);
        assert!(farm.purchase_rig());

        let best = best_upgrade(&farm).unwrap();
        assert_eq!(best.upgrade, RigUpgrade::Level(0));
    }

    #[test]
    fn step_respects_budget() {
        let farm = farm_with_funds(100_000.0);
        // The first rig costs 1000; a 500 budget blocks it.
        assert!(run_rig_step(&farm, 500.0).is_none());
        assert_eq!(farm.rig_count(), 0);

        assert!(run_rig_step(&farm, 1_500.0).is_some());
        assert_eq!(farm.rig_count(), 1);
    }

    #[test]
    fn pass_spends_until_dry() {
        let farm = farm_with_funds(10_000.0);
        let bought = run_rig_pass(&farm, 0.5);
        assert!(bought >= 2);
        // Something was left unspent only because nothing cheaper existed.
        let best = best_upgrade(&farm).unwrap();
        assert!(best.cost > 10_000.0 * 0.5 - spent_estimate(&farm));
    }

    fn spent_estimate<F: RigFarm>(farm: &F) -> f64 {
        // Funds started at 10_000; whatever is gone was spent.
        10_000.0 - farm.funds()
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let farm = farm_with_funds(0.0);
        let (tx, rx) = watch::channel(false);
        let handle = {
            let farm = farm.clone();
            tokio::spawn(async move {
                run_rig_loop(&farm, 0.2, Duration::from_millis(5), rx).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
