//! skim-world — the environment boundary.
//!
//! The engine never talks to its surroundings directly; everything it may
//! touch is a method on the [`World`] trait: the clock, the reachability
//! graph, access escalation, per-node snapshots, operation durations and
//! yields, payload copies, and the fire-and-forget job primitive.
//!
//! [`SimWorld`] is the in-memory implementation backing every test and the
//! daemon's simulate mode. It applies dispatched jobs in landing order, so
//! tests can assert on the engine's timing behavior deterministically.

pub mod sim;
pub mod universe;

use std::collections::{HashSet, VecDeque};

use skim_core::{NodeId, OpKind, TargetSnapshot, TimestampMs, WorkerSnapshot};

/// The collaborator surface the engine consumes.
///
/// Implementations use interior mutability; the control loop is the only
/// caller, so reads and writes never race within a tick. `dispatch` is
/// asynchronous at the environment level: it returns as soon as the job is
/// accepted, and there is no completion channel or cancellation.
pub trait World {
    /// Wall clock in epoch milliseconds.
    fn now_ms(&self) -> TimestampMs;

    /// The distinguished controller host.
    fn self_node(&self) -> NodeId;

    /// One hop of the reachability graph.
    fn neighbors(&self, node: &str) -> Vec<NodeId>;

    /// The controller's current capability level.
    fn capability_level(&self) -> u32;

    /// Number of unlock tools currently available to the controller.
    fn unlock_tools_available(&self) -> u32;

    /// Apply every available unlock tool to the node.
    fn apply_unlock_tools(&self, node: &str);

    /// Attempt privilege escalation; true when the node is (now) accessible.
    fn escalate(&self, node: &str) -> bool;

    fn worker_snapshot(&self, node: &str) -> Option<WorkerSnapshot>;

    fn target_snapshot(&self, node: &str) -> Option<TargetSnapshot>;

    /// Fixed duration of one operation against the target, known ahead of
    /// dispatch.
    fn op_duration_ms(&self, kind: OpKind, target: &str) -> u64;

    /// Capacity cost of a single thread of the operation.
    fn capacity_per_thread(&self, kind: OpKind) -> f64;

    /// Fraction of current funds one hack thread extracts.
    fn per_thread_yield(&self, target: &str) -> f64;

    /// Inverse hack yield: threads needed to extract `amount`. May return
    /// non-finite values; callers clamp.
    fn extract_threads_for(&self, target: &str, amount: f64) -> f64;

    /// Threads needed to multiply the target's funds by `multiplier`.
    fn growth_threads_for(&self, target: &str, multiplier: f64) -> f64;

    /// Copy the operation payload onto the worker if missing. A false
    /// return means the worker must be skipped for this dispatch pass.
    fn ensure_payload(&self, kind: OpKind, worker: &str) -> bool;

    /// Launch `threads` of `kind` on `worker` against `target` after
    /// `delay_ms`. Fire-and-forget: a true return only means the job was
    /// accepted.
    fn dispatch(
        &self,
        kind: OpKind,
        worker: &str,
        threads: u32,
        target: &str,
        alt_effect: bool,
        delay_ms: u64,
    ) -> bool;
}

/// Breadth-first walk of the reachability graph from the self node.
///
/// Returns every reachable node id in discovery order, the self node first.
/// Safe on cyclic graphs.
pub fn discover<W: World + ?Sized>(world: &W) -> Vec<NodeId> {
    let root = world.self_node();
    let mut queue = VecDeque::from([root.clone()]);
    let mut seen: HashSet<NodeId> = HashSet::from([root]);
    let mut order = Vec::new();

    while let Some(node) = queue.pop_front() {
        for neighbor in world.neighbors(&node) {
            if seen.insert(neighbor.clone()) {
                queue.push_back(neighbor);
            }
        }
        order.push(node);
    }

    tracing::debug!(nodes = order.len(), "universe walk complete");
    order
}

pub use sim::{DispatchRecord, SimWorld};
pub use universe::{NodeSpec, UniverseSpec};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{NodeSpec, UniverseSpec};

    fn chain_universe() -> UniverseSpec {
        // home - a - b, with a side branch home - c, and a cycle b - a.
        UniverseSpec {
            nodes: vec![
                NodeSpec {
                    id: "home".to_string(),
                    capacity: 32.0,
                    links: vec!["a".to_string(), "c".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "a".to_string(),
                    links: vec!["b".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "b".to_string(),
                    links: vec!["a".to_string()],
                    ..NodeSpec::default()
                },
                NodeSpec {
                    id: "c".to_string(),
                    ..NodeSpec::default()
                },
            ],
            ..UniverseSpec::default()
        }
    }

    #[test]
    fn discover_visits_every_node_once() {
        let world = SimWorld::from_universe(chain_universe());
        let order = discover(&world);
        assert_eq!(order, vec!["home", "a", "c", "b"]);
    }

    #[test]
    fn discover_starts_at_self_node() {
        let world = SimWorld::from_universe(chain_universe());
        assert_eq!(discover(&world)[0], world.self_node());
    }

    #[test]
    fn discover_tolerates_cycles() {
        let mut spec = chain_universe();
        // Make the cycle tighter: b links back to home as well.
        spec.nodes[2].links.push("home".to_string());
        let world = SimWorld::from_universe(spec);
        let order = discover(&world);
        assert_eq!(order.len(), 4);
    }
}
