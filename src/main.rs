use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use warehouse_sim::SimConfig;
use warehouse_sim::infra::{
    ChannelSink, CompositeSink, TelemetryCollector, TelemetrySink, TracingSink,
};
use warehouse_sim::simulation::{LoggingObserver, RunLimits};

const DEFAULT_METRICS_WINDOW: usize = 100;

/// Headless warehouse pick-and-place simulation
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration; the built-in demo warehouse is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many completed episodes
    #[arg(long)]
    episodes: Option<u64>,

    #[arg(long)]
    max_ticks: Option<u64>,

    /// Write reward events as JSON lines into this directory
    #[arg(long)]
    telemetry_dir: Option<PathBuf>,

    /// Disable telemetry file output even if configured
    #[arg(long)]
    no_telemetry_file: bool,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warehouse_sim=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(args: &Args) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(episodes) = args.episodes {
        config.simulation.episodes = Some(episodes);
    }
    if let Some(max_ticks) = args.max_ticks {
        config.simulation.max_ticks = Some(max_ticks);
    }
    if let Some(dir) = &args.telemetry_dir {
        config.telemetry.dir = Some(dir.clone());
    }
    if args.no_telemetry_file {
        config.telemetry.dir = None;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging()?;

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        "Seed {}, {} actors, dt {}s",
        config.simulation.seed,
        config.actors.len(),
        config.simulation.dt
    );

    let window = config.telemetry.window.unwrap_or(DEFAULT_METRICS_WINDOW);
    let mut collector = TelemetryCollector::new(window);
    if let Some(dir) = &config.telemetry.dir {
        collector = collector.with_output_dir(dir, "warehouse").await?;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let collector_task = tokio::spawn(collector.run(rx));

    let tracing_sink: Arc<dyn TelemetrySink> = Arc::new(TracingSink);
    let channel_sink: Arc<dyn TelemetrySink> = Arc::new(ChannelSink::new(tx));
    let sink: Arc<dyn TelemetrySink> =
        Arc::new(CompositeSink::new(vec![tracing_sink, channel_sink]));

    let mut simulation = config.build_simulation(Some(sink), Box::new(LoggingObserver))?;
    let summary = simulation.run(RunLimits {
        max_ticks: config.simulation.max_ticks,
        episodes: config.simulation.episodes,
    });

    // Controllers own the last senders; dropping them closes the channel
    drop(simulation);
    match collector_task.await {
        Ok(collector) => {
            info!(
                "Collected {} telemetry events over {} episodes",
                collector.event_count(),
                summary.episodes
            );
            collector.metrics().log_summary();
        }
        Err(e) => warn!("Telemetry collector failed: {}", e),
    }

    Ok(())
}
