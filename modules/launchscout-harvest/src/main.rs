use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use launchscout_common::{load_config, Config, HarvestConfig};
use launchscout_harvest::browser::browser_from_config;
use launchscout_harvest::Harvester;

#[derive(Parser)]
#[command(name = "launchscout", about = "App catalog crawler and launch-date enricher")]
#[command(version)]
struct Cli {
    /// Path to config TOML file (defaults apply when omitted)
    #[arg(long, global = true, env = "LAUNCHSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for snapshot files, overriding [output] dir
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover categories and crawl their listings
    Crawl,

    /// Enrich popular listings with launch dates
    Enrich,

    /// Retry enriched records that still lack a launch date
    Recover {
        /// Leave records already marked "404" alone
        #[arg(long)]
        skip_not_found: bool,
    },

    /// Crawl, then enrich
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env()
        .add_directive("launchscout=info".parse()?)
        .add_directive("browserless_client=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env();
    config.log_redacted();

    let mut harvest_config = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "Loading config");
            load_config(path)?
        }
        None => HarvestConfig::default(),
    };
    if let Some(dir) = cli.out_dir {
        harvest_config.output.dir = dir;
    }

    let harvester = Harvester::new(harvest_config, browser_from_config(&config));

    match cli.command {
        Command::Crawl => {
            let stats = harvester.crawl().await?;
            info!("{stats}");
        }
        Command::Enrich => {
            let stats = harvester.enrich().await?;
            info!("{stats}");
        }
        Command::Recover { skip_not_found } => {
            let stats = harvester.recover(skip_not_found).await?;
            info!("{stats}");
        }
        Command::Run => {
            let (_, enrich) = harvester.run().await?;
            info!("{enrich}");
        }
    }
    Ok(())
}
