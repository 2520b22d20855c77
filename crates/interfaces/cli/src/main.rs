mod doctor;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use factbot_catalog::{CatalogStore, JsonCatalog, Selector};
use factbot_config::AppConfig;
use factbot_runtime::{FactBot, FactLibrary, RateGate};
use factbot_twitch::{TwitchSettings, start_bot};

#[derive(Debug, Parser)]
#[command(
    name = "factbot",
    version,
    about = "A chat bot that posts themed facts on demand and on a timer"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Connect to chat and start serving facts (default).
    Start,
    /// Check credentials, config, and fact files.
    Doctor,
    /// List themes and how many facts each holds.
    Themes,
    /// Append a fact to a theme and save it.
    Add { theme: String, fact: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => run_start(config).await?,
        Commands::Doctor => doctor::run(&config, &cli.config)?,
        Commands::Themes => {
            let library = load_library(&config);
            let summary = library.summary().await;
            if summary.is_empty() {
                println!("no themes found in {}", config.facts.directory);
            }
            for (theme, count) in summary {
                println!("{theme}: {count} facts");
            }
        }
        Commands::Add { theme, fact } => {
            if theme.trim().is_empty() || fact.trim().is_empty() {
                anyhow::bail!("both a theme and a fact are required");
            }
            let library = load_library(&config);
            let added = library.add_fact(theme.trim(), fact.trim()).await;
            if added.persisted {
                println!("added fact #{} to '{}'", added.count, added.theme);
            } else {
                anyhow::bail!("fact could not be saved to {}", config.facts.directory);
            }
        }
    }
    Ok(())
}

/// Load the JSON catalog and wire it to a fresh selector.
fn load_library(config: &AppConfig) -> Arc<FactLibrary> {
    let json = JsonCatalog::new(&config.facts.directory);
    let mut catalog = CatalogStore::new(Arc::new(json.clone()));
    let report = catalog.load(&json);
    info!(
        themes = report.themes,
        facts = report.facts,
        failures = report.failures.len(),
        "catalog loaded"
    );
    let selector = Selector::new(config.facts.recent_window);
    Arc::new(FactLibrary::new(catalog, selector))
}

async fn run_start(config: AppConfig) -> Result<()> {
    let settings = TwitchSettings::from_env(&config.twitch)?;
    let library = load_library(&config);
    let themes = library.list_themes().await;
    info!(?themes, "bot initialised for #{}", settings.channel);

    let gate = RateGate::new(config.cooldown());
    let bot = Arc::new(FactBot::new(config, library, gate));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "could not listen for ctrl-c; stop the process to exit");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    start_bot(bot, settings, shutdown_rx).await
}
