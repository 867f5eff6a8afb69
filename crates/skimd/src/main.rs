//! skimd — the skimgrid daemon.
//!
//! Single binary that assembles the engine against a simulated universe:
//! - Control loop (prep / pipeline scheduling)
//! - World pump (applies landings as wall-clock time passes)
//! - Acquisition loops (fleet purchaser, rig upgrader) when configured
//!
//! # Usage
//!
//! ```text
//! skimd simulate --universe universe.toml --duration-secs 30
//! skimd plan --target mill-a
//! skimd init-config
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use skim_core::{ExploitPolicy, SkimConfig};
use skim_world::{SimWorld, UniverseSpec, World};
use skimgrid_acquire::{run_fleet_loop, run_rig_loop};
use skimgrid_planner::plan_batch;
use skimgrid_scheduler::ControlLoop;

#[derive(Parser)]
#[command(name = "skimd", about = "skimgrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine against a simulated universe.
    Simulate {
        /// Path to skim.toml; defaults apply when absent.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to a universe TOML; the built-in demo universe when absent.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Stop after this many seconds; run until ctrl-c when absent.
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Override the control loop interval.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Override the per-batch steal fraction.
        #[arg(long)]
        steal_fraction: Option<f64>,

        /// Override the pipeline depth.
        #[arg(long)]
        pipeline_depth: Option<u32>,

        /// Override the exploitation policy: "landing" or "cooldown".
        #[arg(long)]
        policy: Option<String>,
    },

    /// Print the batch plan for one target as JSON.
    Plan {
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Target node id.
        #[arg(long)]
        target: String,

        #[arg(long, default_value = "0.08")]
        steal_fraction: f64,
    },

    /// Write a default skim.toml.
    InitConfig {
        #[arg(long, default_value = "skim.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skimd=debug,skimgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate {
            config,
            universe,
            duration_secs,
            interval_ms,
            steal_fraction,
            pipeline_depth,
            policy,
        } => {
            let mut config = load_config(config)?;
            if let Some(value) = interval_ms {
                config.engine.loop_interval_ms = value;
            }
            if let Some(value) = steal_fraction {
                config.engine.steal_fraction = value;
            }
            if let Some(value) = pipeline_depth {
                config.engine.pipeline_depth = value;
            }
            if let Some(value) = policy {
                config.engine.policy = parse_policy(&value)?;
            }
            config.validate()?;
            run_simulate(config, load_universe(universe)?, duration_secs).await
        }
        Command::Plan {
            universe,
            target,
            steal_fraction,
        } => run_plan(load_universe(universe)?, &target, steal_fraction),
        Command::InitConfig { path } => {
            anyhow::ensure!(!path.exists(), "refusing to overwrite {}", path.display());
            std::fs::write(&path, SkimConfig::default().to_toml_string()?)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SkimConfig> {
    match path {
        Some(path) => SkimConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SkimConfig::default()),
    }
}

fn load_universe(path: Option<PathBuf>) -> anyhow::Result<UniverseSpec> {
    match path {
        Some(path) => UniverseSpec::from_file(&path)
            .with_context(|| format!("loading universe {}", path.display())),
        None => Ok(UniverseSpec::demo()),
    }
}

fn parse_policy(value: &str) -> anyhow::Result<ExploitPolicy> {
    match value {
        "landing" => Ok(ExploitPolicy::Landing),
        "cooldown" => Ok(ExploitPolicy::Cooldown),
        other => anyhow::bail!("unknown policy {other:?}, expected \"landing\" or \"cooldown\""),
    }
}

async fn run_simulate(
    config: SkimConfig,
    universe: UniverseSpec,
    duration_secs: Option<u64>,
) -> anyhow::Result<()> {
    let world = SimWorld::from_universe(universe);
    world.enable_system_clock();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // World pump: applies landings as wall-clock time passes.
    {
        let world = world.clone();
        let mut shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(20)) => world.pump(),
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    if let Some(acquire) = config.acquire.clone() {
        let interval = Duration::from_millis(acquire.interval_ms);
        {
            let world = world.clone();
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                run_fleet_loop(&world, acquire.fleet_budget_fraction, interval, shutdown).await;
            }));
        }
        {
            let world = world.clone();
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                run_rig_loop(&world, acquire.rig_budget_fraction, interval, shutdown).await;
            }));
        }
    }

    let mut control = ControlLoop::new(world.clone(), config.engine.clone());
    let control_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        control.run(control_shutdown).await;
    }));

    match duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "simulation window elapsed");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("interrupted");
        }
    }

    let _ = shutdown_tx.send(true);
    for task in tasks {
        task.await?;
    }
    // Apply anything that landed during shutdown.
    world.pump();

    let summary = serde_json::json!({
        "total_extracted": world.total_extracted(),
        "controller_funds": world.controller_funds(),
        "fleet_nodes": world.owned_fleet().len(),
        "rigs": world.rig_count(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_plan(universe: UniverseSpec, target: &str, steal_fraction: f64) -> anyhow::Result<()> {
    let world = SimWorld::from_universe(universe);
    let snapshot = world
        .target_snapshot(target)
        .with_context(|| format!("unknown target {target:?}"))?;
    let plan = plan_batch(&world, &snapshot, steal_fraction);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
