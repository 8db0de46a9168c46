use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use github_events_monitor::api::{ApiServer, AppState};
use github_events_monitor::core::Config;
use github_events_monitor::events::MONITORED_KINDS;
use github_events_monitor::store::EventStore;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "github-events-monitor")]
#[command(about = "GitHub events ingestion, metrics and live repository monitoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server with periodic ingestion
    Serve(ServeArgs),

    /// Collect events once and exit
    Collect(CollectArgs),

    /// Show stored event totals by kind
    Status,
}

#[derive(Args)]
struct ServeArgs {
    /// Port override for the API listener
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the periodic ingestion loop
    #[arg(long)]
    no_ingest: bool,
}

#[derive(Args)]
struct CollectArgs {
    /// Maximum events kept per fetch
    #[arg(short, long)]
    limit: Option<usize>,

    /// Repositories to fetch instead of the configured targets
    #[arg(short, long)]
    repos: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::new(cli.config.as_deref().and_then(|p| p.to_str()))?;

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .init();

    info!("GitHub events monitor starting");

    match cli.command {
        Commands::Serve(args) => run_server(config, args).await,
        Commands::Collect(args) => run_collect(config, args).await,
        Commands::Status => run_status(config).await,
    }
}

async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.web.port = port;
    }

    let state = AppState::new(config)?;

    if !args.no_ingest {
        let coordinator = state.coordinator.clone();
        tokio::spawn(async move { coordinator.run_periodic().await });
    }

    ApiServer::new(state).start().await
}

async fn run_collect(config: Config, args: CollectArgs) -> Result<()> {
    let state = AppState::new(config)?;
    let repos = (!args.repos.is_empty()).then_some(args.repos.as_slice());
    let inserted = state.coordinator.collect_now(args.limit, repos).await?;
    println!("{}", serde_json::json!({ "inserted": inserted }));
    Ok(())
}

async fn run_status(config: Config) -> Result<()> {
    let store = EventStore::open(&config.storage.database_path)?;
    let counts = store.count_by_kind(None, None)?;
    let total = store.total_events()?;

    println!("Events stored: {}", total);
    for kind in MONITORED_KINDS {
        if let Some(count) = counts.get(&kind) {
            println!("  {:<32} {}", kind.as_str(), count);
        }
    }
    Ok(())
}
