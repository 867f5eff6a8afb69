//! Market trait wiring for the simulated world.

use skim_core::NodeId;
use skim_world::SimWorld;

use crate::fleet::FleetMarket;
use crate::rig::{RigFarm, RigStats};

impl FleetMarket for SimWorld {
    fn funds(&self) -> f64 {
        self.controller_funds()
    }

    fn fleet_limit(&self) -> u32 {
        SimWorld::fleet_limit(self)
    }

    fn max_node_capacity(&self) -> f64 {
        self.fleet_max_capacity()
    }

    fn owned_nodes(&self) -> Vec<(NodeId, f64)> {
        self.owned_fleet()
    }

    fn node_cost(&self, capacity: f64) -> f64 {
        self.fleet_node_cost(capacity)
    }

    fn purchase(&self, name: &str, capacity: f64) -> bool {
        self.purchase_fleet_node(name, capacity)
    }

    fn retire(&self, name: &str) -> bool {
        self.retire_fleet_node(name)
    }
}

impl RigFarm for SimWorld {
    fn funds(&self) -> f64 {
        self.controller_funds()
    }

    fn rig_count(&self) -> u32 {
        SimWorld::rig_count(self)
    }

    fn rig(&self, index: u32) -> Option<RigStats> {
        self.rig_stats(index).map(|r| RigStats {
            level: r.level,
            ram: r.ram,
            cores: r.cores,
        })
    }

    fn level_cost(&self, index: u32) -> Option<f64> {
        self.rig_level_cost(index)
    }

    fn ram_cost(&self, index: u32) -> Option<f64> {
        self.rig_ram_cost(index)
    }

    fn core_cost(&self, index: u32) -> Option<f64> {
        self.rig_core_cost(index)
    }

    fn new_rig_cost(&self) -> f64 {
        SimWorld::new_rig_cost(self)
    }

    fn upgrade_level(&self, index: u32) -> bool {
        self.rig_upgrade_level(index)
    }

    fn upgrade_ram(&self, index: u32) -> bool {
        self.rig_upgrade_ram(index)
    }

    fn upgrade_core(&self, index: u32) -> bool {
        self.rig_upgrade_core(index)
    }

    fn purchase_rig(&self) -> bool {
        SimWorld::purchase_rig(self)
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use skim_world::{SimWorld, UniverseSpec};

    pub fn farm_with_funds(funds: f64) -> SimWorld {
        let world = SimWorld::from_universe(UniverseSpec::default());
        world.credit(funds);
        world
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::farm_with_funds;
    use crate::fleet::FleetMarket;
    use crate::rig::RigFarm;

    #[test]
    fn fleet_market_reflects_sim_state() {
        let world = farm_with_funds(1_000_000.0);
        assert_eq!(FleetMarket::funds(&world), 1_000_000.0);
        assert!(world.owned_nodes().is_empty());
        assert_eq!(world.node_cost(2.0), 110_000.0);

        assert!(FleetMarket::purchase(&world, "fleet-00", 2.0));
        assert_eq!(world.owned_nodes(), vec![("fleet-00".to_string(), 2.0)]);
        assert_eq!(FleetMarket::funds(&world), 890_000.0);
    }

    #[test]
    fn rig_farm_reflects_sim_state() {
        let world = farm_with_funds(10_000.0);
        assert_eq!(RigFarm::rig_count(&world), 0);
        assert!(RigFarm::purchase_rig(&world));

        let stats = RigFarm::rig(&world, 0).unwrap();
        assert_eq!((stats.level, stats.ram, stats.cores), (1, 1, 1));
        assert!(world.level_cost(0).is_some());
        assert!(world.level_cost(7).is_none());
    }
}
