//! `syllabus-pipeline` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — run the scheduler, the status publisher and the API server.
//! - `run`      — execute one manual run in the foreground.
//! - `schedule` — list the schedule rules and their next firing.
//! - `validate` — validate a pipeline configuration file.
//! - `migrate`  — run pending database migrations.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use db::{MemoryRunStore, PgRunStore, RunStore};
use engine::{Orchestrator, PipelineConfig, RunStatus, StartRun, Trigger};
use status::{ChatChannel, PublishError, SlackRelay, StatusPublisher, StatusTopic};
use workers::HttpWorker;

#[derive(Parser)]
#[command(
    name = "syllabus-pipeline",
    about = "Batch orchestrator for the syllabus scraper",
    version
)]
struct Cli {
    /// Pipeline configuration JSON; built-in defaults when omitted.
    #[arg(long, global = true, env = "PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler, the status publisher and the REST API.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        #[command(flatten)]
        backends: Backends,
    },
    /// Execute one manual run and wait for it to finish.
    Run {
        #[command(flatten)]
        backends: Backends,
    },
    /// Show every schedule rule with its next firing time.
    Schedule,
    /// Validate a pipeline configuration file.
    Validate {
        path: PathBuf,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(clap::Args)]
struct Backends {
    /// Postgres run history; in-memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Overrides the configured worker endpoint.
    #[arg(long, env = "WORKER_ENDPOINT")]
    worker_endpoint: Option<String>,

    /// Overrides the configured Slack webhook.
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<String>,
}

/// Writes status messages to the log when no chat webhook is configured.
struct LogChannel;

#[async_trait]
impl ChatChannel for LogChannel {
    async fn deliver(&self, message: &str) -> Result<(), PublishError> {
        info!(target: "status", "{}", message);
        Ok(())
    }
}

/// Everything a run needs, wired from configuration.
struct Pipeline {
    orchestrator: Orchestrator,
    store: Arc<dyn RunStore>,
    topic: StatusTopic,
    publisher: StatusPublisher,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let config = PipelineConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn build_pipeline(config: &PipelineConfig, backends: Backends) -> Result<Pipeline> {
    let store: Arc<dyn RunStore> = match &backends.database_url {
        Some(url) => {
            let pool = db::pool::create_pool(url, 5).await.context("connecting to database")?;
            Arc::new(PgRunStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, run history is kept in memory");
            Arc::new(MemoryRunStore::new())
        }
    };

    let Some(endpoint) = backends.worker_endpoint.or_else(|| config.worker.endpoint.clone()) else {
        bail!("no worker endpoint configured; set WORKER_ENDPOINT or worker.endpoint");
    };
    let worker = HttpWorker::new(
        config.worker.name.clone(),
        endpoint,
        config.worker.version.clone(),
        Duration::from_secs(config.worker.timeout_secs),
    )?;

    let notifications = &config.notifications;
    let channel: Arc<dyn ChatChannel> =
        match backends.slack_webhook_url.or_else(|| notifications.slack_webhook_url.clone()) {
            Some(url) => Arc::new(SlackRelay::new(
                url,
                notifications.sites.clone(),
                status::relay::DEFAULT_WEBHOOK_TIMEOUT,
            )?),
            None => Arc::new(LogChannel),
        };
    let publisher = StatusPublisher::new(channel, notifications.deploy_filter());

    let topic = StatusTopic::new(config.topic.clone(), status::topic::DEFAULT_CAPACITY);
    let orchestrator = Orchestrator::new(
        config.definition()?,
        Arc::new(worker),
        Arc::clone(&store),
        topic.clone(),
        config.orchestrator_config(),
    );

    Ok(Pipeline { orchestrator, store, topic, publisher })
}

async fn serve(config: PipelineConfig, bind: SocketAddr, backends: Backends) -> Result<()> {
    let scheduler = config.scheduler()?;
    let Pipeline { orchestrator, store, topic, publisher } = build_pipeline(&config, backends).await?;

    let publisher_handle = publisher.spawn(topic.subscribe());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let launcher: Arc<dyn StartRun> = Arc::new(orchestrator);
    let scheduler_handle = scheduler.clone().spawn(Arc::clone(&launcher), shutdown_rx.clone());

    let state = api::AppState { launcher, store, topic, scheduler: Arc::new(scheduler) };
    let mut api_shutdown = shutdown_rx;
    let server = tokio::spawn(api::serve(bind, state, async move {
        let _ = api_shutdown.changed().await;
    }));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    shutdown_tx.send(true)?;

    scheduler_handle.await?;
    server.await??;
    publisher_handle.abort();
    Ok(())
}

async fn run_once(config: PipelineConfig, backends: Backends) -> Result<bool> {
    let Pipeline { orchestrator, topic, publisher, .. } = build_pipeline(&config, backends).await?;
    let publisher_handle = publisher.spawn(topic.subscribe());

    let outcome = orchestrator.run(Trigger::Manual).await;

    // Closing the topic lets the publisher drain and stop.
    drop(orchestrator);
    drop(topic);
    publisher_handle.await?;

    let report = outcome?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "run_id": report.run_id,
        "status": report.status,
        "final_state": report.final_state.to_string(),
        "executed": report.executed,
        "records_written": report.records_written,
        "last_error": report.last_error,
    }))?);

    Ok(report.status == RunStatus::Succeeded)
}

fn print_schedule(config: &PipelineConfig) -> Result<()> {
    let scheduler = config.scheduler()?;
    for (rule, next) in scheduler.upcoming(chrono::Utc::now()) {
        let next = next.map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
        println!("{:<12} {:<40} {}", rule.name, rule.expression(), next);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Serve { bind, backends } => {
            let config = load_config(cli.config.as_ref())?;
            serve(config, bind, backends).await?;
        }
        Command::Run { backends } => {
            let config = load_config(cli.config.as_ref())?;
            if !run_once(config, backends).await? {
                std::process::exit(1);
            }
        }
        Command::Schedule => {
            print_schedule(&load_config(cli.config.as_ref())?)?;
        }
        Command::Validate { path } => match PipelineConfig::from_json_file(&path) {
            Ok(config) => {
                let def = config.definition()?;
                println!(
                    "✅ Configuration is valid: {} batches, {} schedule rules.",
                    def.batches().len(),
                    config.schedules.len()
                );
            }
            Err(e) => {
                eprintln!("❌ Validation failed: {e}");
                std::process::exit(1);
            }
        },
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
        }
    }
    Ok(())
}
