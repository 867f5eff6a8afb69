//! skim.toml configuration parser.
//!
//! Every field carries a tuned default, so an empty file (or no file at
//! all) yields a working setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Which exploitation policy the control loop runs for prepped targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExploitPolicy {
    /// Canonical time-synchronized landing batches kept in a pipeline.
    Landing,
    /// Simpler throttle: one immediate-landing operation per kind per
    /// target, gated by per-target cooldowns.
    Cooldown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkimConfig {
    pub engine: EngineConfig,
    /// Auxiliary purchasers; disabled when absent.
    pub acquire: Option<AcquireConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control loop sleep between ticks, in milliseconds. Short relative to
    /// operation durations: timing accuracy comes from computed delays, not
    /// from this interval.
    pub loop_interval_ms: u64,
    /// Fraction of a target's current funds one batch attempts to extract.
    pub steal_fraction: f64,
    /// Defense tolerance above minimum for a target to count as prepped.
    pub security_buffer: f64,
    /// Funds fraction of max for a target to count as prepped.
    pub funding_threshold: f64,
    /// Overlapping batches kept in flight per target.
    pub pipeline_depth: u32,
    /// Spacing between landing instants of consecutive batches.
    pub chain_spacing_ms: u64,
    /// Guard band between landing instants of legs within one batch.
    pub step_pad_ms: u64,
    /// Usable share of the self node's capacity; the rest stays reserved.
    pub self_capacity_fraction: f64,
    pub policy: ExploitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Share of controller funds the fleet purchaser may spend per pass.
    pub fleet_budget_fraction: f64,
    /// Share of controller funds the rig upgrader may spend per pass.
    pub rig_budget_fraction: f64,
    /// Interval between purchase passes, in milliseconds.
    pub interval_ms: u64,
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            acquire: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 250,
            steal_fraction: 0.08,
            security_buffer: 5.0,
            funding_threshold: 0.95,
            pipeline_depth: 6,
            chain_spacing_ms: 200,
            step_pad_ms: 120,
            self_capacity_fraction: 0.8,
            policy: ExploitPolicy::Landing,
        }
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            fleet_budget_fraction: 0.2,
            rig_budget_fraction: 0.2,
            interval_ms: 10_000,
        }
    }
}

impl SkimConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SkimConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let e = &self.engine;
        if !(e.steal_fraction > 0.0 && e.steal_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "steal_fraction must be in (0, 1), got {}",
                e.steal_fraction
            )));
        }
        if !(e.funding_threshold > 0.0 && e.funding_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "funding_threshold must be in (0, 1], got {}",
                e.funding_threshold
            )));
        }
        if e.pipeline_depth == 0 {
            return Err(ConfigError::Invalid(
                "pipeline_depth must be at least 1".to_string(),
            ));
        }
        if e.step_pad_ms == 0 || e.chain_spacing_ms == 0 {
            return Err(ConfigError::Invalid(
                "step_pad_ms and chain_spacing_ms must be positive".to_string(),
            ));
        }
        if !(e.self_capacity_fraction > 0.0 && e.self_capacity_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "self_capacity_fraction must be in (0, 1], got {}",
                e.self_capacity_fraction
            )));
        }
        if e.security_buffer < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "security_buffer must be non-negative, got {}",
                e.security_buffer
            )));
        }
        if let Some(a) = &self.acquire {
            for (name, value) in [
                ("fleet_budget_fraction", a.fleet_budget_fraction),
                ("rig_budget_fraction", a.rig_budget_fraction),
            ] {
                if !(value > 0.0 && value <= 1.0) {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be in (0, 1], got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}
