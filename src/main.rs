//! Overlap Scanner - finds wallets that traded several tokens
//!
//! Each token's trader list comes from an external fetcher (a scraper
//! process by default). Scans are rate-sensitive: keep the concurrency low
//! unless the data source is known to tolerate more.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use overlap_scanner::cli::commands::{self, OutputFormat, ScanOverrides};
use overlap_scanner::config::{Config, FetcherKind};
use overlap_scanner::scan::TimeWindow;

/// Overlap Scanner - smart money discovery across tokens
#[derive(Parser)]
#[command(name = "overlap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "OVERLAP_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan tokens and report wallets that traded more than one of them
    Scan {
        /// Token addresses to scan
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Lookback window: 1d, 3d, 7d or 30d (default from config)
        #[arg(short, long)]
        window: Option<TimeWindow>,

        /// Parallel fetches (default from config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-token deadline in seconds (default from config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Progress output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("overlap_scanner=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Scan {
            tokens,
            window,
            concurrency,
            timeout,
            format,
        } => {
            startup_checks(&config);
            let overrides = ScanOverrides {
                window,
                concurrency,
                timeout_secs: timeout,
            };
            commands::scan(&config, tokens, overrides, format).await
        }
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Warn early about a fetcher setup that is going to fail every token
fn startup_checks(config: &Config) {
    if config.fetcher.kind != FetcherKind::Command {
        return;
    }

    info!("Performing startup checks...");
    for arg in &config.fetcher.args {
        let looks_like_script = arg.ends_with(".py") || arg.ends_with(".js") || arg.ends_with(".sh");
        if looks_like_script && !std::path::Path::new(arg).exists() {
            warn!(
                "Fetcher script {} not found relative to {:?} - every token will fail",
                arg,
                std::env::current_dir().unwrap_or_default()
            );
        }
    }
}
