//! votetally CLI
//!
//! Local entry point: list threadmarks, tally a voting round, manage the cache.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use votetally::{
    error::Result,
    models::Config,
    pipeline::{self, TallyOptions},
    services::{DocumentCache, FetchRegistry, RateLimiter},
    storage::DiskStore,
    utils::HttpFetcher,
};

/// votetally - Forum Quest Vote Counter
#[derive(Parser, Debug)]
#[command(
    name = "votetally",
    version,
    about = "Tallies forum quest votes between two threadmarks"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "votetally.toml")]
    config: PathBuf,

    /// Override the cache directory from the configuration
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a thread's threadmarks, most recent first
    Threadmarks {
        /// Thread URL
        url: String,
    },

    /// Count the votes cast after a threadmark
    Tally {
        /// Thread URL
        url: String,

        /// Threadmark number from `threadmarks`, or its title (default: most recent)
        #[arg(short, long)]
        threadmark: Option<String>,

        /// Refetch the thread instead of using cached pages
        #[arg(long)]
        force: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop every cached document of a thread
    Invalidate {
        /// Thread URL
        url: String,
    },

    /// Delete expired cache entries now
    Sweep,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_cache(config: &Config) -> Result<Arc<DocumentCache>> {
    let store = DiskStore::open(&config.cache.dir).await?;
    let fetcher = HttpFetcher::from_config(&config.fetch)?;
    let limiter = RateLimiter::new(config.fetch.requests_per_second);
    let cache = DocumentCache::new(
        Arc::new(store),
        Arc::new(fetcher),
        Arc::new(limiter),
        config,
    )?;
    Ok(Arc::new(cache))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }
    init_logging(cli.verbose, &config.logging.level);

    if let Command::Validate = cli.command {
        pipeline::run_validate(&cli.config)?;
        return Ok(());
    }

    config.validate()?;
    log::info!("Using cache at {}", config.cache.dir.display());
    let cache = open_cache(&config).await?;

    match cli.command {
        Command::Threadmarks { url } => {
            let registry = FetchRegistry::new(Arc::clone(&cache), &config);
            pipeline::run_threadmarks(&registry, &url).await?;
        }

        Command::Tally {
            url,
            threadmark,
            force,
            json,
        } => {
            let _sweeper = cache.spawn_sweeper(config.cache.sweep_interval());
            let registry = FetchRegistry::new(Arc::clone(&cache), &config);
            let options = TallyOptions {
                threadmark,
                force,
                json,
            };
            pipeline::run_tally(&registry, &url, &options).await?;
        }

        Command::Invalidate { url } => {
            pipeline::run_invalidate(&cache, &config.forum.hosts, &url).await?;
        }

        Command::Sweep => {
            pipeline::run_sweep(&cache).await?;
        }

        Command::Validate => {}
    }

    Ok(())
}
