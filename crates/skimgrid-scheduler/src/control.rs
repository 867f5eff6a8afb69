//! The control loop — one tick of the whole engine, and its tokio run
//! loop.
//!
//! A tick rebuilds everything from live environment queries: discover the
//! universe, escalate what can be escalated, snapshot workers and targets,
//! rank, then route every eligible target to prep or exploitation. Nothing
//! survives between ticks except the cooldown map of the alternate policy,
//! and that is an explicit value owned here.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use skim_core::{
    Cooldowns, EngineConfig, ExploitPolicy, NodeId, TargetSnapshot, WorkerSnapshot,
};
use skim_world::{discover, World};
use skimgrid_dispatch::ReservePolicy;
use skimgrid_planner::is_prepped;

use crate::access::try_gain_access;
use crate::cooldown::assign_ops;
use crate::pipeline::fill_pipeline;
use crate::prep::run_prep_step;

/// What one tick accomplished.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickReport {
    pub nodes_seen: usize,
    pub workers: usize,
    pub eligible_targets: usize,
    pub prepped_targets: usize,
    pub batches_scheduled: u32,
    pub prep_actions: u32,
    pub cooldown_ops: u32,
}

/// The per-tick driver. Owns nothing durable beyond the engine config and
/// the cooldown map; snapshots live for one tick only.
pub struct ControlLoop<W> {
    world: W,
    engine: EngineConfig,
    cooldowns: HashMap<NodeId, Cooldowns>,
}

impl<W: World> ControlLoop<W> {
    pub fn new(world: W, engine: EngineConfig) -> Self {
        Self {
            world,
            engine,
            cooldowns: HashMap::new(),
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Run one full pass over the universe.
    pub fn tick(&mut self) -> TickReport {
        let universe = discover(&self.world);
        let mut report = TickReport {
            nodes_seen: universe.len(),
            ..TickReport::default()
        };

        // Escalate everything we can't touch yet; failures retry next tick.
        for id in &universe {
            if let Some(snapshot) = self.world.target_snapshot(id)
                && !snapshot.metrics.has_access
            {
                try_gain_access(&self.world, &snapshot);
            }
        }

        // Snapshot workers and eligible targets, post-escalation.
        let capability = self.world.capability_level();
        let mut workers: Vec<WorkerSnapshot> = Vec::new();
        let mut targets: Vec<TargetSnapshot> = Vec::new();
        for id in &universe {
            let Some(snapshot) = self.world.target_snapshot(id) else {
                continue;
            };
            if !snapshot.metrics.has_access {
                continue;
            }
            if let Some(worker) = self.world.worker_snapshot(id)
                && worker.capacity_max > 0.0
            {
                workers.push(worker);
            }
            if snapshot.identity.max_funds > 0.0
                && snapshot.identity.required_access_level <= capability
            {
                targets.push(snapshot);
            }
        }
        rank_targets(&mut targets);
        report.workers = workers.len();
        report.eligible_targets = targets.len();

        let reserve = ReservePolicy::new(
            self.world.self_node(),
            self.engine.self_capacity_fraction,
        );

        for target in &targets {
            let prepped = is_prepped(
                target,
                self.engine.security_buffer,
                self.engine.funding_threshold,
            );
            if prepped {
                report.prepped_targets += 1;
            }
            match self.engine.policy {
                ExploitPolicy::Landing => {
                    if prepped {
                        report.batches_scheduled += fill_pipeline(
                            &self.world,
                            target.id(),
                            &workers,
                            &self.engine,
                            &reserve,
                        );
                    } else if run_prep_step(
                        &self.world,
                        target.id(),
                        &workers,
                        &self.engine,
                        &reserve,
                    ) {
                        report.prep_actions += 1;
                    }
                }
                ExploitPolicy::Cooldown => {
                    let entry = self
                        .cooldowns
                        .get(target.id())
                        .copied()
                        .unwrap_or_default();
                    let updated = assign_ops(
                        &self.world,
                        target.id(),
                        &workers,
                        &self.engine,
                        &reserve,
                        entry,
                    );
                    if updated != entry {
                        report.cooldown_ops += 1;
                    }
                    self.cooldowns.insert(target.id().to_string(), updated);
                }
            }
        }

        // Drop cooldown state for targets that left the universe.
        if self.engine.policy == ExploitPolicy::Cooldown {
            self.cooldowns
                .retain(|id, _| targets.iter().any(|t| t.id() == id));
        }

        debug!(?report, "tick complete");
        report
    }

    /// Drive ticks forever at the configured interval, until shutdown.
    ///
    /// The loop never blocks on dispatched work — timing accuracy comes
    /// from computed delays, so the sleep only bounds reaction latency.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.engine.loop_interval_ms,
            policy = ?self.engine.policy,
            "control loop started"
        );
        let interval = Duration::from_millis(self.engine.loop_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick();
                }
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}

/// Rank targets most attractive first: funds ceiling per unit of minimum
/// defense. A deliberately simple heuristic.
pub fn rank_targets(targets: &mut [TargetSnapshot]) {
    let score =
        |t: &TargetSnapshot| t.identity.max_funds / t.identity.min_defense.max(1.0);
    targets.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
