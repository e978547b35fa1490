//! Listing crawler CLI
//!
//! Partitions a market's search into page-sized queries, then fetches
//! every result page through the proxy list.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use listing_crawler::{
    error::Result,
    models::{Config, Query, load_proxies},
    pipeline::{self, CrawlContext},
    storage::open_store,
};

/// Crawl every listing of a capped search service
#[derive(Parser, Debug)]
#[command(
    name = "listing-crawler",
    version,
    about = "Adaptive query partitioner and crawler for capped listing searches"
)]
struct Cli {
    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory; overrides `storage.dir` from the config file
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Target {
    /// Search URL of the market to crawl, optionally with filters
    #[arg(long)]
    base_url: String,

    /// Proxy CSV with an ip_addr,port[,user,password] header
    /// (default: {storage_dir}/proxies.csv)
    #[arg(long)]
    proxies: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Partition the search into queries that fit the page window
    Pages {
        #[command(flatten)]
        target: Target,
    },

    /// Partition, then fetch every result page
    Properties {
        #[command(flatten)]
        target: Target,

        /// Fetch from the stored frontier without probing
        #[arg(long)]
        skip_partition: bool,
    },

    /// Show frontier coverage and gaps
    Report {
        /// Limit the report to the frontier under this search URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Time each proxy against a search URL
    CheckProxies {
        /// Proxy CSV (default: {storage_dir}/proxies.csv)
        #[arg(long)]
        proxies: Option<PathBuf>,

        /// URL to request through every proxy
        #[arg(
            long,
            default_value = "https://www.redfin.com/city/1362/CA/Belmont/filter/include=sold-3yr,min-price=500000"
        )]
        url: String,

        /// Requests per proxy
        #[arg(long, default_value_t = pipeline::proxies::DEFAULT_TRIES)]
        tries: usize,

        /// Also time a direct connection without proxy
        #[arg(long)]
        direct: bool,
    },

    /// Validate configuration, proxies and base URL
    Validate {
        #[command(flatten)]
        target: Target,
    },
}

/// Initialize logging; `RUST_LOG` takes precedence over `level`.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_dir = cli
        .storage_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("storage"));
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| base_dir.join("config.toml"));

    // Read the config before the logger exists so its level can apply.
    let loaded = Config::load(&config_path);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            Config::default()
        }
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.clone();
    }
    let config = Arc::new(config);
    let default_proxies = base_dir.join("proxies.csv");

    match cli.command {
        Command::Pages { target } => {
            let root = Query::from_base_url(&target.base_url)?;
            let proxies = target.proxies.unwrap_or(default_proxies);
            let context = CrawlContext::build(Arc::clone(&config), &proxies).await?;
            pipeline::run_pages(&context, &root).await?;
        }

        Command::Properties {
            target,
            skip_partition,
        } => {
            let root = Query::from_base_url(&target.base_url)?;
            let proxies = target.proxies.unwrap_or(default_proxies);
            let context = CrawlContext::build(Arc::clone(&config), &proxies).await?;
            pipeline::run_properties(&context, &root, skip_partition).await?;
            pipeline::run_report(&config, context.store.as_ref(), Some(&root)).await?;
        }

        Command::Report { base_url } => {
            let scope = base_url.as_deref().map(Query::from_base_url).transpose()?;
            let store = open_store(&config.storage).await?;
            pipeline::run_report(&config, store.as_ref(), scope.as_ref()).await?;
        }

        Command::CheckProxies {
            proxies,
            url,
            tries,
            direct,
        } => {
            let proxies = load_proxies(proxies.unwrap_or(default_proxies))?;
            pipeline::run_check_proxies(&config, proxies, &url, tries, direct).await?;
        }

        Command::Validate { target } => {
            let proxies = target.proxies.unwrap_or(default_proxies);
            pipeline::run_validate(&config, &proxies, &target.base_url)?;
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
