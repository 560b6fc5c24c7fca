//! foresight - recurring task scheduler.
//!
//! Usage:
//!   foresight validate               Check every task in the config
//!   foresight preview                Show the next run times of every task
//!   foresight schedule --database Q  Run one scheduling pass against a queue
//!   foresight clear --database Q     Delete every run the scheduler queued

use chrono::Utc;
use clap::{Parser, Subcommand};
use foresight::{
    InMemoryQueue, JobQueue, SchedulerJob, TaskConfigBuilder, YamlLoader, delete_all_scheduled,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// foresight - keeps a job queue filled with upcoming runs of recurring tasks
#[derive(Parser)]
#[command(name = "foresight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every task in the config
    Validate {
        /// Config file (default: $FORESIGHT_CONFIG or config/foresight.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the run times each task would queue against an empty queue
    Preview {
        /// Config file (default: $FORESIGHT_CONFIG or config/foresight.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show at most this many run times per task
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Run one scheduling pass
    Schedule {
        /// Config file (default: $FORESIGHT_CONFIG or config/foresight.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// SQLite queue database; without it the pass is a dry run in memory
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Delete every run the scheduler has queued
    Clear {
        /// SQLite queue database
        #[arg(short, long)]
        database: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(config.as_deref())?,
        Commands::Preview { config, count } => preview(config.as_deref(), count)?,
        Commands::Schedule { config, database } => {
            schedule(config.as_deref(), database.as_deref()).await?
        }
        Commands::Clear { database } => clear(&database).await?,
    }

    Ok(())
}

/// Build every task and report the ones that fail.
fn validate(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = YamlLoader::resolve_path(config);
    info!("Validating tasks in: {}", path.display());

    let config = YamlLoader::load(&path)?;
    let built = TaskConfigBuilder::new(&config).build_all(&config);

    let mut failed = 0;
    for (task, result) in &built {
        match result {
            Ok(spec) => println!("  {} ({} every {}): OK", task, spec.class(), spec.frequency()),
            Err(e) => {
                failed += 1;
                println!("  {}: {} ({})", task, e.kind(), e);
            }
        }
    }

    if failed > 0 {
        error!("{} of {} task(s) are invalid", failed, built.len());
        return Err(format!("{} invalid task(s)", failed).into());
    }
    info!("All {} task(s) are valid", built.len());
    Ok(())
}

/// Print the first `count` run times of each task.
fn preview(config: Option<&Path>, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = YamlLoader::load(YamlLoader::resolve_path(config))?;
    let now = Utc::now();

    for (task, result) in TaskConfigBuilder::new(&config).build_all(&config) {
        match result {
            Ok(spec) => {
                println!("{} ({}, {}):", task, spec.class(), spec.timezone());
                for run_at in spec.future_run_times_at(&[], now).iter().take(count) {
                    println!("  {}", run_at.format("%a %Y-%m-%d %H:%M %Z"));
                }
            }
            Err(e) => warn!("Skipping task '{}': {}", task, e),
        }
    }
    Ok(())
}

/// Run one scheduling pass.
async fn schedule(
    config: Option<&Path>,
    database: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let queue: Arc<dyn JobQueue> = match database {
        Some(path) => open_queue(path).await?,
        None => {
            info!("No database given, dry run against an in-memory queue");
            Arc::new(InMemoryQueue::new())
        }
    };

    let scheduler = SchedulerJob::load(queue, config)?;
    let report = scheduler.run_pass().await?;

    for submission in &report.submitted {
        println!(
            "  queued {} at {}",
            submission.task,
            submission.run_at.format("%a %Y-%m-%d %H:%M %Z")
        );
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {} ({})", skipped.task, skipped.kind, skipped.error);
    }
    info!(
        "Queued {} run(s), skipped {} task(s)",
        report.submitted.len(),
        report.skipped.len()
    );
    Ok(())
}

/// Delete every scheduler entry from the queue.
async fn clear(database: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(database).await?;
    let deleted = delete_all_scheduled(queue.as_ref()).await?;
    println!("Deleted {} scheduled run(s)", deleted);
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_queue(path: &Path) -> Result<Arc<dyn JobQueue>, Box<dyn std::error::Error>> {
    info!("Opening queue database: {}", path.display());
    Ok(Arc::new(foresight::SqliteQueue::new(path).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_queue(path: &Path) -> Result<Arc<dyn JobQueue>, Box<dyn std::error::Error>> {
    Err(format!(
        "cannot open {}: built without the `sqlite` feature",
        path.display()
    )
    .into())
}
