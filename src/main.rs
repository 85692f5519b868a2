//! Sitemap-Relay main entry point
//!
//! This is the command-line interface for the Sitemap-Relay sitemap mirror.

use chrono::Utc;
use clap::{Parser, Subcommand};
use sitemap_relay::config::{load_config, Config};
use sitemap_relay::output::{output_path, print_status, write_document};
use sitemap_relay::service::{ServiceError, SitemapService};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sitemap-Relay: mirror a remote XML sitemap
///
/// Sitemap-Relay fetches the sitemap of one configured store, caches it
/// with an expiry, and serves it back as a sitemap-protocol document under
/// the local site.
#[derive(Parser, Debug)]
#[command(name = "sitemap-relay")]
#[command(version)]
#[command(about = "Mirror a remote XML sitemap behind a local cache", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the remote sitemap now and refresh the cache
    Update {
        /// Skip the manual update rate limit
        #[arg(long)]
        force: bool,
    },

    /// Render the cached sitemap to the output file
    Render {
        /// Render only this 1-based page of entries
        #[arg(long)]
        page: Option<usize>,

        /// Print to stdout instead of writing the output file
        #[arg(long)]
        stdout: bool,
    },

    /// Show what is cached
    Status,

    /// Delete the cached sitemap
    Clear,

    /// Keep the sitemap fresh on the configured schedule until interrupted
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(cfg) => {
            tracing::info!(
                "Configuration loaded successfully (source fingerprint: {})",
                cfg.fingerprint()
            );
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let service = SitemapService::from_config(config)?;

    match cli.command {
        Command::Update { force } => handle_update(&service, force).await?,
        Command::Render { page, stdout } => handle_render(&service, page, stdout).await?,
        Command::Status => print_status(&service.status()?),
        Command::Clear => {
            service.clear()?;
            println!("Cached sitemap cleared");
        }
        Command::Run => handle_run(&service).await?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemap_relay=info,warn"),
            1 => EnvFilter::new("sitemap_relay=debug,info"),
            2 => EnvFilter::new("sitemap_relay=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

type Service = SitemapService<sitemap_relay::sitemap::SafeFetcher, sitemap_relay::storage::SqliteCache>;

/// Handles `update`: a manual trigger, rate limited unless forced
async fn handle_update(service: &Service, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = if force {
        service.trigger_update().await.map_err(ServiceError::from)
    } else {
        service.trigger_manual_update(Utc::now()).await
    };

    match result {
        Ok(outcome) => {
            println!(
                "Sitemap updated: {} {} entries, expires {}",
                outcome.count,
                outcome.kind,
                outcome.expires_at.to_rfc3339()
            );
            for warning in &outcome.warnings {
                println!("  warning: {}", warning);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to update sitemap: {}", e);
            Err(e.into())
        }
    }
}

/// Handles `render`: writes the document (or one page of it)
async fn handle_render(
    service: &Service,
    page: Option<usize>,
    stdout: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let xml = match page {
        Some(page) => service.render_page(page).await,
        None => service.render_sitemap().await,
    };

    if stdout {
        println!("{}", xml);
    } else {
        let path = page_path(service.config(), page);
        write_document(&path, &xml)?;
        match page {
            Some(page) => println!(
                "Page {} of {} written to {}",
                page,
                service.status()?.pages,
                path.display()
            ),
            None => println!("Sitemap written to {}", path.display()),
        }
    }

    Ok(())
}

/// Output file for a page: `store.xml` for the whole document,
/// `store-2.xml` for page 2
fn page_path(config: &Config, page: Option<usize>) -> PathBuf {
    let path = output_path(config);
    match page {
        Some(page) => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = match path.extension() {
                Some(ext) => format!("{}-{}.{}", stem, page, ext.to_string_lossy()),
                None => format!("{}-{}", stem, page),
            };
            path.with_file_name(file)
        }
        None => path,
    }
}

/// Handles `run`: update and rewrite the output file on every tick
async fn handle_run(service: &Service) -> Result<(), Box<dyn std::error::Error>> {
    let period = service.config().schedule.frequency.period();
    let path = output_path(service.config());
    tracing::info!(
        "Refreshing every {}s, writing {}",
        period.as_secs(),
        path.display()
    );

    loop {
        match service.trigger_update().await {
            Ok(outcome) => tracing::info!("Cached {} {} entries", outcome.count, outcome.kind),
            Err(e) => tracing::warn!("Scheduled update failed: {}", e),
        }

        let xml = service
            .renderer()
            .render(
                service.cached().ok().flatten().as_ref().map(|c| &c.payload),
                service.config().source.flatten,
            );
        if let Err(e) = write_document(&path, &xml) {
            tracing::error!("Failed to write {}: {}", path.display(), e);
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received interrupt signal, stopping");
                break;
            }
        }
    }

    Ok(())
}
