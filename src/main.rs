//! Command-line front end: estimate or run a plan of task sets against the
//! simulated microscope.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use stm_tasks::config::{FailurePolicy, Settings};
use stm_tasks::logging;
use stm_tasks::plan::Plan;
use stm_tasks::scheduler::{Scheduler, SchedulerActor, SchedulerEvent};
use stm_tasks::taskset::DurationBreakdown;
use stm_tasks::worker::SimulatedMicroscope;

/// Unattended STM task-set runner.
#[derive(Parser)]
#[command(name = "stm_tasks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print task counts and expected acquisition time of a plan
    Estimate {
        /// Plan file with [[task_set]] tables
        plan: PathBuf,
    },

    /// Run every task set of a plan; Ctrl-C stops after the current task
    Run {
        /// Plan file with [[task_set]] tables
        plan: PathBuf,

        /// What to do when a task fails
        #[arg(long, value_enum)]
        fail_policy: Option<FailurePolicy>,

        /// Simulation speed factor (overrides worker.time_scale)
        #[arg(long)]
        time_scale: Option<f64>,

        /// Result directory (overrides worker.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Estimate { plan } => {
            logging::init(&settings.application, cli.verbose);
            estimate(&plan)
        }
        Commands::Run {
            plan,
            fail_policy,
            time_scale,
            output,
        } => {
            if let Some(policy) = fail_policy {
                settings.scheduler.failure_policy = policy;
            }
            if let Some(scale) = time_scale {
                settings.worker.time_scale = scale;
            }
            if let Some(dir) = output {
                settings.worker.output_dir = dir;
            }
            settings.validate().context("Invalid command-line overrides")?;
            logging::init(&settings.application, cli.verbose);
            run(&plan, &settings).await
        }
    }
}

fn estimate(path: &Path) -> Result<()> {
    let plan = Plan::load(path).with_context(|| format!("Failed to load plan {}", path.display()))?;

    let mut total_seconds = 0.0;
    let mut total_images = 0;
    for (name, est) in plan.estimates()? {
        println!(
            "{:<24} {:>6} tasks {:>6} images  {}",
            name,
            est.task_count,
            est.image_count,
            est.breakdown()
        );
        total_seconds += est.total_seconds;
        total_images += est.image_count;
    }
    println!(
        "{:<24} {:>19} images  {}",
        "total",
        total_images,
        DurationBreakdown::from_seconds(total_seconds)
    );
    Ok(())
}

async fn run(path: &Path, settings: &Settings) -> Result<()> {
    let plan = Plan::load(path).with_context(|| format!("Failed to load plan {}", path.display()))?;
    info!(
        sets = plan.task_sets.len(),
        policy = ?settings.scheduler.failure_policy,
        output = %settings.worker.output_dir.display(),
        "Starting run"
    );

    let scheduler = Scheduler::new(settings.limits.clone(), settings.scheduler.failure_policy);
    let worker = Arc::new(SimulatedMicroscope::from_settings(&settings.worker));
    let (handle, join) = SchedulerActor::spawn(scheduler, worker, &settings.scheduler);
    let mut events = handle.subscribe();

    for config in plan.task_sets {
        let summary = handle.add(config).await?;
        println!(
            "[{}] {} ({} tasks, ~{})",
            summary.index,
            summary.name,
            summary.total_tasks,
            summary.estimate.breakdown()
        );
    }
    handle.play().await?;

    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SchedulerEvent::Idle { paused: false }) => break,
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("Failed to listen for Ctrl-C")?;
                println!("Stop requested; waiting for the current task to finish");
                stop_requested = true;
                handle.stop().await?;
            }
        }
    }

    let snapshot = handle.snapshot().await?;
    for set in &snapshot.sets {
        println!(
            "{:<24} {:<9} {}/{} tasks",
            set.name, set.status.to_string(), set.completed_tasks, set.selected_tasks
        );
    }
    handle.shutdown().await?;
    join.await.context("Scheduler actor panicked")?;
    Ok(())
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::TaskStarted {
            set_name, label, ..
        } => println!("  {set_name}: started {label}"),
        SchedulerEvent::TaskCompleted {
            set_name,
            ordinal,
            progress,
            result,
            ..
        } => println!(
            "  {set_name}: #{ordinal} done ({:.0}%) -> {}",
            progress * 100.0,
            result.display()
        ),
        SchedulerEvent::TaskFailed {
            set_name,
            ordinal,
            error,
            ..
        } => println!("  {set_name}: #{ordinal} failed: {error}"),
        SchedulerEvent::TaskAbandoned {
            set_name, ordinal, ..
        } => println!("  {set_name}: #{ordinal} abandoned"),
        SchedulerEvent::StatusChanged {
            set_name, status, ..
        } => println!("{set_name}: {status}"),
        SchedulerEvent::Idle { .. } => {}
    }
}
