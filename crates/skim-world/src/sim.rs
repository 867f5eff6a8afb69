//! Deterministic in-memory world.
//!
//! `SimWorld` models everything the engine drives: nodes with capacity and
//! drifting defense/funds metrics, fixed operation durations, the unlock/
//! escalation ladder, and a pending-job queue. Dispatch consumes worker
//! capacity immediately and `advance_to` applies landings in time order,
//! releasing capacity and mutating the target — so tests can assert on the
//! engine's timing behavior without real sleeps.
//!
//! Cloning is cheap and shares the same universe.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use skim_core::{
    GROW_DEFENSE_COST, HACK_DEFENSE_COST, NodeId, OpKind, TargetIdentity, TargetMetrics,
    TargetSnapshot, TimestampMs, WEAKEN_REDUCTION, WorkerSnapshot,
};

use crate::World;
use crate::universe::UniverseSpec;

/// Capacity cost per thread for each operation kind.
fn per_thread_capacity(kind: OpKind) -> f64 {
    match kind {
        OpKind::Weaken | OpKind::Grow => 1.75,
        OpKind::Hack => 1.7,
    }
}

/// One accepted dispatch, kept for test assertions and the simulate summary.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub kind: OpKind,
    pub worker: NodeId,
    pub target: NodeId,
    pub threads: u32,
    pub alt_effect: bool,
    pub delay_ms: u64,
    pub accepted_at: TimestampMs,
    /// Instant the job's fixed-duration execution completes.
    pub landing_ms: TimestampMs,
}

/// Stats of one income rig in the rig farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigState {
    pub level: u32,
    pub ram: u32,
    pub cores: u32,
}

#[derive(Debug)]
struct SimNode {
    capacity_max: f64,
    capacity_used: f64,
    min_defense: f64,
    defense: f64,
    max_funds: f64,
    funds: f64,
    required_access_level: u32,
    required_unlocks: u32,
    unlocks_applied: u32,
    has_access: bool,
    payloads: HashSet<OpKind>,
    payload_copy_fails: bool,
    weaken_ms: u64,
    grow_ms: u64,
    hack_ms: u64,
    yield_per_thread: f64,
    growth_base: f64,
    purchased: bool,
}

impl SimNode {
    fn duration_ms(&self, kind: OpKind) -> u64 {
        match kind {
            OpKind::Weaken => self.weaken_ms,
            OpKind::Grow => self.grow_ms,
            OpKind::Hack => self.hack_ms,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingJob {
    seq: u64,
    kind: OpKind,
    worker: NodeId,
    target: NodeId,
    threads: u32,
    capacity_held: f64,
    landing: TimestampMs,
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Manual(TimestampMs),
    System,
}

impl Clock {
    fn read(&self) -> TimestampMs {
        match self {
            Clock::Manual(t) => *t,
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as TimestampMs,
        }
    }
}

struct Inner {
    clock: Clock,
    self_node: NodeId,
    capability_level: u32,
    unlock_tools: u32,
    controller_funds: f64,
    fleet_limit: u32,
    fleet_max_capacity: f64,
    nodes: BTreeMap<NodeId, SimNode>,
    links: BTreeMap<NodeId, Vec<NodeId>>,
    pending: Vec<PendingJob>,
    log: Vec<DispatchRecord>,
    rigs: Vec<RigState>,
    seq: u64,
    total_extracted: f64,
    last_income_at: TimestampMs,
}

/// The deterministic in-memory [`World`] implementation.
#[derive(Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<Inner>>,
}

impl SimWorld {
    pub fn from_universe(spec: UniverseSpec) -> Self {
        let mut nodes = BTreeMap::new();
        let mut links: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

        for node in &spec.nodes {
            let is_self = node.id == spec.self_node;
            let mut payloads = HashSet::new();
            if is_self {
                payloads.extend([OpKind::Weaken, OpKind::Grow, OpKind::Hack]);
            }
            nodes.insert(
                node.id.clone(),
                SimNode {
                    capacity_max: node.capacity,
                    capacity_used: 0.0,
                    min_defense: node.min_defense,
                    defense: node.defense.unwrap_or(node.min_defense),
                    max_funds: node.max_funds,
                    funds: node.funds.unwrap_or(node.max_funds),
                    required_access_level: node.required_access_level,
                    required_unlocks: node.required_unlocks,
                    unlocks_applied: 0,
                    has_access: node.has_access || is_self,
                    payloads,
                    payload_copy_fails: false,
                    weaken_ms: node.weaken_ms,
                    grow_ms: node.grow_ms,
                    hack_ms: node.hack_ms,
                    yield_per_thread: node.yield_per_thread,
                    growth_base: node.growth_base,
                    purchased: false,
                },
            );
            links.entry(node.id.clone()).or_default();
        }

        // Symmetrize the adjacency the spec declares one-way.
        for node in &spec.nodes {
            for peer in &node.links {
                link(&mut links, &node.id, peer);
            }
        }

        SimWorld {
            inner: Arc::new(Mutex::new(Inner {
                clock: Clock::Manual(0),
                self_node: spec.self_node,
                capability_level: spec.capability_level,
                unlock_tools: spec.unlock_tools,
                controller_funds: spec.controller_funds,
                fleet_limit: spec.fleet_limit,
                fleet_max_capacity: spec.fleet_max_capacity,
                nodes,
                links,
                pending: Vec::new(),
                log: Vec::new(),
                rigs: Vec::new(),
                seq: 0,
                total_extracted: 0.0,
                last_income_at: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch from the manual test clock to the system clock (daemon mode).
    pub fn enable_system_clock(&self) {
        let mut inner = self.lock();
        inner.clock = Clock::System;
        inner.last_income_at = inner.clock.read();
    }

    /// Move the manual clock to `t` and apply every landing due by then,
    /// in landing order.
    pub fn advance_to(&self, t: TimestampMs) {
        let mut inner = self.lock();
        if let Clock::Manual(current) = inner.clock
            && t > current
        {
            inner.clock = Clock::Manual(t);
        }
        let now = inner.clock.read();
        inner.apply_income(now);
        loop {
            let due = inner
                .pending
                .iter()
                .enumerate()
                .filter(|(_, job)| job.landing <= now)
                .min_by_key(|(_, job)| (job.landing, job.seq))
                .map(|(i, _)| i);
            match due {
                Some(i) => {
                    let job = inner.pending.swap_remove(i);
                    inner.apply_job(job);
                }
                None => break,
            }
        }
    }

    /// Apply everything due at the current instant (system-clock mode).
    pub fn pump(&self) {
        let now = self.lock().clock.read();
        self.advance_to(now);
    }

    // ── Test support ───────────────────────────────────────────────

    pub fn set_now(&self, t: TimestampMs) {
        self.lock().clock = Clock::Manual(t);
    }

    pub fn dispatch_log(&self) -> Vec<DispatchRecord> {
        self.lock().log.clone()
    }

    pub fn clear_dispatch_log(&self) {
        self.lock().log.clear();
    }

    pub fn pending_jobs(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn set_target_state(&self, id: &str, defense: f64, funds: f64) {
        let mut inner = self.lock();
        if let Some(node) = inner.nodes.get_mut(id) {
            node.defense = defense;
            node.funds = funds;
        }
    }

    pub fn set_payload_copy_fails(&self, id: &str, fails: bool) {
        let mut inner = self.lock();
        if let Some(node) = inner.nodes.get_mut(id) {
            node.payload_copy_fails = fails;
        }
    }

    pub fn set_unlock_tools(&self, count: u32) {
        self.lock().unlock_tools = count;
    }

    pub fn set_capability_level(&self, level: u32) {
        self.lock().capability_level = level;
    }

    pub fn credit(&self, amount: f64) {
        self.lock().controller_funds += amount;
    }

    // ── Controller balance ─────────────────────────────────────────

    pub fn controller_funds(&self) -> f64 {
        self.lock().controller_funds
    }

    pub fn total_extracted(&self) -> f64 {
        self.lock().total_extracted
    }

    // ── Fleet market ───────────────────────────────────────────────

    pub fn fleet_limit(&self) -> u32 {
        self.lock().fleet_limit
    }

    pub fn fleet_max_capacity(&self) -> f64 {
        self.lock().fleet_max_capacity
    }

    /// Purchased nodes as `(id, capacity)` pairs.
    pub fn owned_fleet(&self) -> Vec<(NodeId, f64)> {
        self.lock()
            .nodes
            .iter()
            .filter(|(_, n)| n.purchased)
            .map(|(id, n)| (id.clone(), n.capacity_max))
            .collect()
    }

    pub fn fleet_node_cost(&self, capacity: f64) -> f64 {
        capacity * 55_000.0
    }

    /// Buy a new fleet node; debits the controller balance.
    pub fn purchase_fleet_node(&self, name: &str, capacity: f64) -> bool {
        let cost = self.fleet_node_cost(capacity);
        let mut inner = self.lock();
        let owned = inner.nodes.values().filter(|n| n.purchased).count() as u32;
        if owned >= inner.fleet_limit
            || capacity > inner.fleet_max_capacity
            || inner.controller_funds < cost
            || inner.nodes.contains_key(name)
        {
            return false;
        }
        inner.controller_funds -= cost;
        inner.nodes.insert(
            name.to_string(),
            SimNode {
                capacity_max: capacity,
                capacity_used: 0.0,
                min_defense: 1.0,
                defense: 1.0,
                max_funds: 0.0,
                funds: 0.0,
                required_access_level: 0,
                required_unlocks: 0,
                unlocks_applied: 0,
                has_access: true,
                payloads: HashSet::from([OpKind::Weaken, OpKind::Grow, OpKind::Hack]),
                payload_copy_fails: false,
                weaken_ms: 4000,
                grow_ms: 3200,
                hack_ms: 1000,
                yield_per_thread: 0.0,
                growth_base: 1.0,
                purchased: true,
            },
        );
        let self_node = inner.self_node.clone();
        link(&mut inner.links, &self_node, name);
        debug!(node = name, capacity, cost, "fleet node purchased");
        true
    }

    /// Remove a purchased node; its in-flight jobs are dropped.
    pub fn retire_fleet_node(&self, name: &str) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get(name) {
            Some(node) if node.purchased => {}
            _ => return false,
        }
        inner.nodes.remove(name);
        inner.pending.retain(|job| job.worker != name);
        inner.links.remove(name);
        for peers in inner.links.values_mut() {
            peers.retain(|p| p.as_str() != name);
        }
        debug!(node = name, "fleet node retired");
        true
    }

    // ── Rig farm ───────────────────────────────────────────────────

    pub fn rig_count(&self) -> u32 {
        self.lock().rigs.len() as u32
    }

    pub fn rig_stats(&self, index: u32) -> Option<RigState> {
        self.lock().rigs.get(index as usize).copied()
    }

    pub fn new_rig_cost(&self) -> f64 {
        1000.0 * 1.85f64.powi(self.lock().rigs.len() as i32)
    }

    pub fn rig_level_cost(&self, index: u32) -> Option<f64> {
        let rig = self.rig_stats(index)?;
        Some(500.0 * 1.04f64.powi(rig.level as i32))
    }

    pub fn rig_ram_cost(&self, index: u32) -> Option<f64> {
        let rig = self.rig_stats(index)?;
        Some(800.0 * 1.28f64.powi(rig.ram as i32))
    }

    pub fn rig_core_cost(&self, index: u32) -> Option<f64> {
        let rig = self.rig_stats(index)?;
        Some(1000.0 * 1.48f64.powi(rig.cores as i32))
    }

    pub fn purchase_rig(&self) -> bool {
        let cost = self.new_rig_cost();
        let mut inner = self.lock();
        if inner.controller_funds < cost {
            return false;
        }
        inner.controller_funds -= cost;
        inner.rigs.push(RigState {
            level: 1,
            ram: 1,
            cores: 1,
        });
        true
    }

    pub fn rig_upgrade_level(&self, index: u32) -> bool {
        self.rig_upgrade(index, |r| r.level += 1, |w, i| w.rig_level_cost(i))
    }

    pub fn rig_upgrade_ram(&self, index: u32) -> bool {
        self.rig_upgrade(index, |r| r.ram += 1, |w, i| w.rig_ram_cost(i))
    }

    pub fn rig_upgrade_core(&self, index: u32) -> bool {
        self.rig_upgrade(index, |r| r.cores += 1, |w, i| w.rig_core_cost(i))
    }

    fn rig_upgrade(
        &self,
        index: u32,
        apply: impl FnOnce(&mut RigState),
        cost_of: impl FnOnce(&Self, u32) -> Option<f64>,
    ) -> bool {
        let Some(cost) = cost_of(self, index) else {
            return false;
        };
        let mut inner = self.lock();
        if inner.controller_funds < cost {
            return false;
        }
        inner.controller_funds -= cost;
        apply(&mut inner.rigs[index as usize]);
        true
    }
}

impl Inner {
    /// Funds per second a rig produces.
    fn rig_production(rig: &RigState) -> f64 {
        rig.level as f64
            * 1.035f64.powi(rig.ram as i32 - 1)
            * (1.0 + (rig.cores as f64 - 1.0) / 5.0)
    }

    fn apply_income(&mut self, now: TimestampMs) {
        let dt_ms = now.saturating_sub(self.last_income_at);
        self.last_income_at = now;
        if dt_ms == 0 || self.rigs.is_empty() {
            return;
        }
        let rate: f64 = self.rigs.iter().map(Inner::rig_production).sum();
        self.controller_funds += rate * dt_ms as f64 / 1000.0;
    }

    fn apply_job(&mut self, job: PendingJob) {
        if let Some(worker) = self.nodes.get_mut(&job.worker) {
            worker.capacity_used = (worker.capacity_used - job.capacity_held).max(0.0);
        }
        let Some(target) = self.nodes.get_mut(&job.target) else {
            return;
        };
        let threads = job.threads as f64;
        match job.kind {
            OpKind::Weaken => {
                target.defense = (target.defense - threads * WEAKEN_REDUCTION).max(target.min_defense);
            }
            OpKind::Grow => {
                let mult = target.growth_base.powi(job.threads as i32);
                target.funds = (target.funds.max(1.0) * mult).min(target.max_funds);
                target.defense += threads * GROW_DEFENSE_COST;
            }
            OpKind::Hack => {
                let steal = (target.funds * target.yield_per_thread * threads)
                    .floor()
                    .clamp(0.0, target.funds);
                target.funds -= steal;
                target.defense += threads * HACK_DEFENSE_COST;
                self.controller_funds += steal;
                self.total_extracted += steal;
            }
        }
    }
}

fn link(links: &mut BTreeMap<NodeId, Vec<NodeId>>, a: &str, b: &str) {
    let forward = links.entry(a.to_string()).or_default();
    if !forward.iter().any(|p| p == b) {
        forward.push(b.to_string());
    }
    let back = links.entry(b.to_string()).or_default();
    if !back.iter().any(|p| p == a) {
        back.push(a.to_string());
    }
}

impl World for SimWorld {
    fn now_ms(&self) -> TimestampMs {
        self.lock().clock.read()
    }

    fn self_node(&self) -> NodeId {
        self.lock().self_node.clone()
    }

    fn neighbors(&self, node: &str) -> Vec<NodeId> {
        self.lock().links.get(node).cloned().unwrap_or_default()
    }

    fn capability_level(&self) -> u32 {
        self.lock().capability_level
    }

    fn unlock_tools_available(&self) -> u32 {
        self.lock().unlock_tools
    }

    fn apply_unlock_tools(&self, node: &str) {
        let mut inner = self.lock();
        let tools = inner.unlock_tools;
        if let Some(n) = inner.nodes.get_mut(node) {
            n.unlocks_applied = n.unlocks_applied.max(tools);
        }
    }

    fn escalate(&self, node: &str) -> bool {
        let mut inner = self.lock();
        let Some(n) = inner.nodes.get_mut(node) else {
            return false;
        };
        if !n.has_access && n.unlocks_applied >= n.required_unlocks {
            n.has_access = true;
            debug!(node, "escalation succeeded");
        }
        n.has_access
    }

    fn worker_snapshot(&self, node: &str) -> Option<WorkerSnapshot> {
        let inner = self.lock();
        let n = inner.nodes.get(node)?;
        Some(WorkerSnapshot {
            id: node.to_string(),
            capacity_max: n.capacity_max,
            capacity_used: n.capacity_used,
        })
    }

    fn target_snapshot(&self, node: &str) -> Option<TargetSnapshot> {
        let inner = self.lock();
        let n = inner.nodes.get(node)?;
        Some(TargetSnapshot {
            identity: TargetIdentity {
                id: node.to_string(),
                min_defense: n.min_defense,
                max_funds: n.max_funds,
                required_access_level: n.required_access_level,
                required_unlocks: n.required_unlocks,
            },
            metrics: TargetMetrics {
                defense: n.defense,
                funds: n.funds,
                has_access: n.has_access,
            },
        })
    }

    fn op_duration_ms(&self, kind: OpKind, target: &str) -> u64 {
        self.lock()
            .nodes
            .get(target)
            .map(|n| n.duration_ms(kind))
            .unwrap_or(0)
    }

    fn capacity_per_thread(&self, kind: OpKind) -> f64 {
        per_thread_capacity(kind)
    }

    fn per_thread_yield(&self, target: &str) -> f64 {
        self.lock()
            .nodes
            .get(target)
            .map(|n| n.yield_per_thread)
            .unwrap_or(0.0)
    }

    fn extract_threads_for(&self, target: &str, amount: f64) -> f64 {
        let inner = self.lock();
        let Some(n) = inner.nodes.get(target) else {
            return f64::INFINITY;
        };
        if n.funds <= 0.0 || n.yield_per_thread <= 0.0 {
            return f64::INFINITY;
        }
        amount / (n.funds * n.yield_per_thread)
    }

    fn growth_threads_for(&self, target: &str, multiplier: f64) -> f64 {
        let inner = self.lock();
        let Some(n) = inner.nodes.get(target) else {
            return f64::INFINITY;
        };
        if multiplier <= 1.0 {
            return 0.0;
        }
        if n.growth_base <= 1.0 {
            return f64::INFINITY;
        }
        multiplier.ln() / n.growth_base.ln()
    }

    fn ensure_payload(&self, kind: OpKind, worker: &str) -> bool {
        let mut inner = self.lock();
        let Some(n) = inner.nodes.get_mut(worker) else {
            return false;
        };
        if n.payloads.contains(&kind) {
            return true;
        }
        if n.payload_copy_fails {
            warn!(worker, %kind, "payload copy failed, skipping worker");
            return false;
        }
        n.payloads.insert(kind);
        true
    }

    fn dispatch(
        &self,
        kind: OpKind,
        worker: &str,
        threads: u32,
        target: &str,
        alt_effect: bool,
        delay_ms: u64,
    ) -> bool {
        if threads == 0 {
            return false;
        }
        let mut inner = self.lock();
        let now = inner.clock.read();
        let Some(duration) = inner.nodes.get(target).map(|n| n.duration_ms(kind)) else {
            return false;
        };
        let Some(node) = inner.nodes.get_mut(worker) else {
            return false;
        };
        if !node.has_access || !node.payloads.contains(&kind) {
            return false;
        }
        let need = per_thread_capacity(kind) * threads as f64;
        if node.capacity_max - node.capacity_used + 1e-9 < need {
            return false;
        }
        node.capacity_used += need;

        let landing = now + delay_ms + duration;
        inner.seq += 1;
        let seq = inner.seq;
        inner.pending.push(PendingJob {
            seq,
            kind,
            worker: worker.to_string(),
            target: target.to_string(),
            threads,
            capacity_held: need,
            landing,
        });
        inner.log.push(DispatchRecord {
            kind,
            worker: worker.to_string(),
            target: target.to_string(),
            threads,
            alt_effect,
            delay_ms,
            accepted_at: now,
            landing_ms: landing,
        });
        true
    }
}
