use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pulsecard_core::{PulsecardConfig, RetryPolicy, TaskConfigStore};
use pulsecard_delivery::{DeliveryClient, MemoryHistory};
use pulsecard_metrics::MetricsSource;
use pulsecard_scheduler::{FileTaskStore, RunnerOptions, Scheduler, TaskRegistry, TaskRunner};

#[derive(Parser)]
#[command(name = "pulsecard", about = "Scheduled metrics queries pushed as chart cards to chat webhooks", version)]
struct Cli {
    /// Config file path (default: ~/.pulsecard/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Task store directory override.
    #[arg(long, global = true)]
    tasks: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler loop (default).
    Run,
    /// Execute one task immediately, bypassing its re-run interval.
    ForceRun { task_id: String },
    /// Print the configured tasks.
    ListTasks,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PulsecardConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PulsecardConfig::load().context("loading config")?,
    };

    let store_dir = cli.tasks.clone().unwrap_or_else(|| config.store_dir.clone());
    let store = Arc::new(FileTaskStore::new(&store_dir));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, store).await,
        Command::ForceRun { task_id } => {
            let runner = build_runner(&config, store);
            runner.run(&task_id, true).await?;
            Ok(())
        }
        Command::ListTasks => {
            for task in store.list_tasks().await? {
                let state = if task.enabled { "enabled" } else { "disabled" };
                println!(
                    "{}  {}  [{}]  span={}  queries={}  destinations={}",
                    task.id,
                    task.name,
                    state,
                    task.span,
                    task.queries.len(),
                    task.destinations.len()
                );
            }
            Ok(())
        }
    }
}

async fn run(config: PulsecardConfig, store: Arc<FileTaskStore>) -> Result<()> {
    if config.metrics_url.is_empty() {
        tracing::warn!("⚠️ metrics_url is not configured; queries will fail until it is set");
    }

    let registry = Arc::new(TaskRegistry::new());
    let runner = build_runner_with(&config, store.clone(), registry.clone());
    let scheduler = Arc::new(Scheduler::new(
        config.scheduler.clone(),
        store,
        registry,
    ));
    let _loop = scheduler.spawn(runner);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("👋 Shutting down");
    Ok(())
}

fn build_runner(config: &PulsecardConfig, store: Arc<FileTaskStore>) -> Arc<TaskRunner> {
    build_runner_with(config, store, Arc::new(TaskRegistry::new()))
}

fn build_runner_with(
    config: &PulsecardConfig,
    store: Arc<FileTaskStore>,
    registry: Arc<TaskRegistry>,
) -> Arc<TaskRunner> {
    let history = Arc::new(MemoryHistory::new());
    let delivery = Arc::new(DeliveryClient::with_policy(
        history,
        RetryPolicy {
            max_attempts: config.delivery.max_attempts,
            ..RetryPolicy::delivery()
        },
        std::time::Duration::from_secs(config.delivery.timeout_secs),
    ));
    let source = Arc::new(MetricsSource::new(&config.metrics_url));
    Arc::new(TaskRunner::new(
        store,
        source,
        delivery,
        registry,
        RunnerOptions {
            footer: config.footer.clone(),
            rate_limit_cooldown: std::time::Duration::from_secs(
                config.delivery.rate_limit_cooldown_secs,
            ),
            min_rerun_floor: std::time::Duration::from_secs(config.scheduler.min_rerun_floor_secs),
        },
    ))
}
