//! Universe specifications — serde-loadable descriptions of a simulated
//! world, used by the daemon's simulate mode and by tests.

use std::path::Path;

use serde::{Deserialize, Serialize};

use skim_core::NodeId;

/// A whole simulated universe: the controller plus every reachable node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSpec {
    /// The controller's own host.
    pub self_node: NodeId,
    pub capability_level: u32,
    /// Unlock tools available to the controller.
    pub unlock_tools: u32,
    /// Starting controller balance.
    pub controller_funds: f64,
    /// Fleet purchaser limits.
    pub fleet_limit: u32,
    pub fleet_max_capacity: f64,
    pub nodes: Vec<NodeSpec>,
}

/// One node of the universe. Links are symmetrized when the world is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub id: NodeId,
    pub capacity: f64,
    pub min_defense: f64,
    /// Defaults to `min_defense` when absent.
    pub defense: Option<f64>,
    pub max_funds: f64,
    /// Defaults to `max_funds` when absent.
    pub funds: Option<f64>,
    pub required_access_level: u32,
    pub required_unlocks: u32,
    pub has_access: bool,
    pub links: Vec<NodeId>,
    pub weaken_ms: u64,
    pub grow_ms: u64,
    pub hack_ms: u64,
    /// Fraction of current funds one hack thread extracts.
    pub yield_per_thread: f64,
    /// Per-thread funds multiplier base for grow.
    pub growth_base: f64,
}

impl Default for UniverseSpec {
    fn default() -> Self {
        Self {
            self_node: "home".to_string(),
            capability_level: 1,
            unlock_tools: 0,
            controller_funds: 0.0,
            fleet_limit: 25,
            fleet_max_capacity: (1u64 << 20) as f64,
            nodes: Vec::new(),
        }
    }
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            capacity: 0.0,
            min_defense: 1.0,
            defense: None,
            max_funds: 0.0,
            funds: None,
            required_access_level: 0,
            required_unlocks: 0,
            has_access: false,
            links: Vec::new(),
            weaken_ms: 4000,
            grow_ms: 3200,
            hack_ms: 1000,
            yield_per_thread: 0.002,
            growth_base: 1.03,
        }
    }
}

impl UniverseSpec {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let spec: UniverseSpec = toml::from_str(&content)?;
        Ok(spec)
    }

    /// A small built-in universe for the daemon's simulate mode: the
    /// controller host, two open targets and one locked one.
    pub fn demo() -> Self {
        UniverseSpec {
            capability_level: 10,
            unlock_tools: 1,
            nodes: vec![
                NodeSpec {
                    id: "home".to_string(),
                    capacity: 512.0,
                    has_access: true,
                    links: vec!["mill-a".to_string(), "mill-b".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "mill-a".to_string(),
                    capacity: 64.0,
                    min_defense: 2.0,
                    max_funds: 2_000_000.0,
                    funds: Some(500_000.0),
                    defense: Some(6.0),
                    required_access_level: 1,
                    links: vec!["vault".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "mill-b".to_string(),
                    capacity: 32.0,
                    min_defense: 5.0,
                    max_funds: 800_000.0,
                    required_access_level: 5,
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "vault".to_string(),
                    min_defense: 10.0,
                    defense: Some(25.0),
                    max_funds: 10_000_000.0,
                    funds: Some(1_000_000.0),
                    required_access_level: 50,
                    required_unlocks: 2,
                    ..NodeSpec::default()
                },
            ],
            ..UniverseSpec::default()
        }
    }
}
