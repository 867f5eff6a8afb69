//! Domain types for the skimgrid engine.
//!
//! Targets are split into an immutable identity and a metrics snapshot that
//! is re-read every control-loop tick; the two are joined by node id. Worker
//! snapshots are ephemeral per-pass reads and are never retained across a
//! dispatch call.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the universe (worker or target).
pub type NodeId = String;

/// Wall-clock instant in epoch milliseconds.
pub type TimestampMs = u64;

/// Defense added per hack thread in the reference environment.
pub const HACK_DEFENSE_COST: f64 = 0.002;

/// Defense added per grow thread in the reference environment.
pub const GROW_DEFENSE_COST: f64 = 0.004;

/// Defense removed per weaken thread in the reference environment.
pub const WEAKEN_REDUCTION: f64 = 0.05;

// ── Operations ─────────────────────────────────────────────────────

/// The three operation kinds a batch is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Reduces a target's defense.
    Weaken,
    /// Restores a target's funds (raises defense as a side effect).
    Grow,
    /// Extracts a target's funds (raises defense as a side effect).
    Hack,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Weaken => "weaken",
            OpKind::Grow => "grow",
            OpKind::Hack => "hack",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Workers ────────────────────────────────────────────────────────

/// Per-pass read of a compute node's identity and capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: NodeId,
    pub capacity_max: f64,
    pub capacity_used: f64,
}

impl WorkerSnapshot {
    /// Free capacity after reserving a slice of the node for its owner.
    ///
    /// `usable_fraction` is 1.0 for ordinary workers and below 1.0 only for
    /// the distinguished self node.
    pub fn free_capacity(&self, usable_fraction: f64) -> f64 {
        (self.capacity_max * usable_fraction - self.capacity_used).max(0.0)
    }
}

// ── Targets ────────────────────────────────────────────────────────

/// Static facts about a target, stable across ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub id: NodeId,
    pub min_defense: f64,
    pub max_funds: f64,
    /// Capability level the controller must reach before operating on it.
    pub required_access_level: u32,
    /// Unlock tools that must be applied before escalation can succeed.
    pub required_unlocks: u32,
}

/// Live metrics, re-read from the environment every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub defense: f64,
    pub funds: f64,
    pub has_access: bool,
}

/// A target's identity joined with its current metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub identity: TargetIdentity,
    pub metrics: TargetMetrics,
}

impl TargetSnapshot {
    pub fn id(&self) -> &str {
        &self.identity.id
    }
}

// ── Cooldowns ──────────────────────────────────────────────────────

/// Per-target earliest-next-dispatch instants for the cooldown policy.
///
/// A plain value: the control loop owns the map, hands copies to the
/// assignment step, and stores the updated value back each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldowns {
    pub weaken: TimestampMs,
    pub grow: TimestampMs,
    pub hack: TimestampMs,
}

impl Cooldowns {
    /// Whether `kind` may be dispatched at `now`.
    pub fn ready(&self, kind: OpKind, now: TimestampMs) -> bool {
        self.until(kind) <= now
    }

    pub fn until(&self, kind: OpKind) -> TimestampMs {
        match kind {
            OpKind::Weaken => self.weaken,
            OpKind::Grow => self.grow,
            OpKind::Hack => self.hack,
        }
    }

    /// Block `kind` until the given instant.
    pub fn arm(&mut self, kind: OpKind, until: TimestampMs) {
        match kind {
            OpKind::Weaken => self.weaken = until,
            OpKind::Grow => self.grow = until,
            OpKind::Hack => self.hack = until,
        }
    }
}

// ── Batch plans ────────────────────────────────────────────────────

/// Thread counts for the four legs of one self-contained batch.
///
/// Execution order is hack → weaken (hack leg) → grow → weaken (grow leg);
/// every count is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub hack_threads: u32,
    pub grow_threads: u32,
    /// Weaken threads sized to cancel the hack leg's defense rise.
    pub weaken_hack: u32,
    /// Weaken threads sized to cancel the grow leg's defense rise.
    pub weaken_grow: u32,
}

impl BatchPlan {
    pub fn total_threads(&self) -> u32 {
        self.hack_threads + self.grow_threads + self.weaken_hack + self.weaken_grow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_capacity_respects_usable_fraction() {
        let w = WorkerSnapshot {
            id: "home".to_string(),
            capacity_max: 100.0,
            capacity_used: 30.0,
        };
        assert_eq!(w.free_capacity(1.0), 70.0);
        assert_eq!(w.free_capacity(0.8), 50.0);
    }

    #[test]
    fn free_capacity_floors_at_zero() {
        let w = WorkerSnapshot {
            id: "n1".to_string(),
            capacity_max: 10.0,
            capacity_used: 9.0,
        };
        // Reserved slice exceeds what's left.
        assert_eq!(w.free_capacity(0.5), 0.0);
    }

    #[test]
    fn cooldowns_ready_and_arm() {
        let mut cd = Cooldowns::default();
        assert!(cd.ready(OpKind::Hack, 0));

        cd.arm(OpKind::Hack, 500);
        assert!(!cd.ready(OpKind::Hack, 499));
        assert!(cd.ready(OpKind::Hack, 500));
        // Other kinds are unaffected.
        assert!(cd.ready(OpKind::Weaken, 0));
        assert!(cd.ready(OpKind::Grow, 0));
    }

    #[test]
    fn batch_plan_total() {
        let plan = BatchPlan {
            hack_threads: 3,
            grow_threads: 10,
            weaken_hack: 1,
            weaken_grow: 1,
        };
        assert_eq!(plan.total_threads(), 15);
    }

    #[test]
    fn op_kind_display_matches_as_str() {
        for kind in [OpKind::Weaken, OpKind::Grow, OpKind::Hack] {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
