//! cadence -- run a synthetic workload through the cooperative scheduler.
//!
//! The scheduler runs on a single-threaded tokio runtime inside a
//! `LocalSet`; each slice is a local task, so a host ticker job gets turns
//! between slices. Prints a summary, or the raw metrics with `--json`.

mod cli;
mod workload;

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::LocalSet;
use tracing::{info, warn};

use cadence_scheduler::{LocalSetHost, MonotonicClock, Scheduler, SchedulerConfig};

use crate::cli::CliArgs;
use crate::workload::{WorkloadPlan, WorkloadStats};

/// Load the scheduler config: the file if one was given, otherwise
/// defaults with environment overrides.
fn load_config(path: Option<&str>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => match SchedulerConfig::from_file(path) {
            Ok(cfg) => {
                info!(path, "loaded scheduler config");
                Ok(cfg)
            }
            Err(e) => {
                warn!(error = %e, path, "failed to load config, using defaults");
                SchedulerConfig::from_env().context("invalid scheduler config")
            }
        },
        None => SchedulerConfig::from_env().context("invalid scheduler config"),
    }
}

/// Host job that re-spawns itself while the scheduler loop is running.
fn spawn_host_ticker(scheduler: Scheduler, ticks: Rc<Cell<u64>>) {
    tokio::task::spawn_local(async move {
        ticks.set(ticks.get() + 1);
        if scheduler.is_loop_running() {
            spawn_host_ticker(scheduler, ticks);
        }
    });
}

async fn run(args: CliArgs, config: SchedulerConfig) -> Result<()> {
    let scheduler = Scheduler::new(config, MonotonicClock::new(), LocalSetHost::new())
        .context("failed to create scheduler")?;
    if let Some(fps) = args.frame_rate {
        scheduler
            .force_frame_rate(fps)
            .context("invalid --frame-rate")?;
    }

    let plan = WorkloadPlan {
        tasks: args.tasks,
        units: args.units,
        unit: Duration::from_micros(args.unit_micros),
        cancel_every: args.cancel_every,
        seed: args.seed,
    };
    let stats = Rc::new(WorkloadStats::default());
    let host_ticks = Rc::new(Cell::new(0));

    info!(
        tasks = plan.tasks,
        frame_interval_ms = scheduler.frame_interval(),
        "scheduler starting"
    );
    let started = Instant::now();

    let cancelled = workload::enqueue(&scheduler, &plan, &stats);
    spawn_host_ticker(scheduler.clone(), host_ticks.clone());

    while scheduler.is_loop_running() {
        tokio::task::yield_now().await;
    }

    let metrics = scheduler.metrics();
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        completed = metrics.total_completed(),
        cancelled = cancelled.len(),
        flushes = metrics.flushes,
        yields = metrics.yields,
        host_ticks = host_ticks.get(),
        "scheduler idle"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("tasks finished:     {}", stats.tasks_finished.get());
        println!("follow-ups:         {}", stats.follow_ups.get());
        println!("work units:         {}", stats.units_done.get());
        println!("cancelled:          {}", cancelled.len());
        println!("failed:             {}", metrics.tasks_failed);
        println!("continuation steps: {}", metrics.continuations);
        println!("overdue steps:      {}", metrics.timed_out_steps);
        println!("slices:             {}", metrics.flushes);
        println!("host turns:         {}", host_ticks.get());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(args.config.as_deref())?;

    let local = LocalSet::new();
    local.run_until(run(args, config)).await?;

    info!("cadence exited cleanly");
    Ok(())
}
