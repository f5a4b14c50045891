use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_grid::{
    config::Config,
    ingestor::{AssetScheduleMapper, CronTrigger, CycleSettings, HarvestJob, IngestionCycle, SchedulerService},
    sources::PressAssociationClient,
    storage::{
        ChannelDirectory, JsonFileChannelDirectory, JsonFileRunMarkerStore, JsonFileScheduleStore,
        ScheduleStore,
    },
    timeline::{GuideRequest, GuideService},
    utils::time::{Clock, SystemClock},
};

#[derive(Parser)]
#[command(name = "epg-grid")]
#[command(version)]
#[command(about = "Harvests per-channel programme schedules and builds gap-free guide timelines")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the harvest on the configured cron schedule until interrupted
    Run,
    /// Run one harvest now
    Ingest,
    /// Print guide timelines for a window as JSON
    Guide {
        /// Window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        /// Restrict to these channel ids (repeatable)
        #[arg(long = "channel")]
        channels: Vec<String>,
        /// Category code, or "all"
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete stored schedules starting between two UTC days, inclusive
    Purge {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

struct Services {
    config: Config,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ScheduleStore>,
    channels: Arc<dyn ChannelDirectory>,
}

impl Services {
    async fn open(config: Config) -> Result<Self> {
        let store = JsonFileScheduleStore::open(&config.storage.schedules_path)
            .await
            .context("Failed to open schedule store")?;
        let channels = JsonFileChannelDirectory::new(&config.storage.channels_path);
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            store: Arc::new(store),
            channels: Arc::new(channels),
        })
    }

    fn harvest_job(&self) -> Result<HarvestJob> {
        let provider = PressAssociationClient::new(&self.config.provider)?;
        let cycle = IngestionCycle::new(
            Arc::new(provider),
            AssetScheduleMapper::new(self.config.ingestion.placeholder_image_url.clone()),
            self.clock.clone(),
            CycleSettings::from_config(&self.config)?,
        );
        Ok(HarvestJob::new(
            cycle,
            self.channels.clone(),
            self.store.clone(),
            Arc::new(JsonFileRunMarkerStore::new(&self.config.storage.state_path)),
            self.clock.clone(),
        ))
    }
}

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("epg_grid={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting epg-grid v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let services = Services::open(config).await?;

    match cli.command {
        Command::Run => {
            let job = Arc::new(services.harvest_job()?);
            let ingestion = &services.config.ingestion;
            let trigger = CronTrigger::new(
                ingestion.schedule()?,
                ingestion.timezone()?,
                services.clock.clone(),
            );
            info!(
                "Scheduling harvest with '{}' in {}",
                ingestion.cron, ingestion.timezone
            );
            let scheduler = SchedulerService::new(Box::new(trigger), job, ingestion.run_on_startup);
            tokio::spawn(scheduler.run(shutdown_token()))
                .await
                .context("Ingestion scheduler task panicked")??;
        }
        Command::Ingest => {
            let summary = services.harvest_job()?.run(&shutdown_token()).await?;
            info!(
                "Harvest {} finished: {} channel(s), {} fetched, {} stored, {} round(s)",
                summary.cycle_id, summary.channels, summary.fetched, summary.stored, summary.rounds
            );
            if !summary.failures.is_empty() {
                for failure in &summary.failures {
                    warn!(
                        "Channel {} unresolved after {} attempt(s): {}",
                        failure.channel_id, failure.attempts, failure.last_error
                    );
                }
                anyhow::bail!("{} channel(s) unresolved", summary.failures.len());
            }
        }
        Command::Guide {
            start,
            end,
            channels,
            category,
        } => {
            let guide = GuideService::new(services.store.clone(), services.channels.clone());
            let request = GuideRequest {
                start,
                end,
                channel_ids: (!channels.is_empty()).then_some(channels),
                category,
            };
            let timelines = guide.build_guide(&request).await?;
            println!("{}", serde_json::to_string_pretty(&timelines)?);
        }
        Command::Purge { from, to } => {
            if to < from {
                anyhow::bail!("--to ({to}) must not be before --from ({from})");
            }
            let deleted = services.store.delete_within_range(from, to).await?;
            info!("Deleted {} schedule(s) starting {} .. {}", deleted, from, to);
        }
    }

    Ok(())
}
