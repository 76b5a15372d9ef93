//! worksync - harvest OpenAlex works for an institution into DuckDB
//!
//! Fetches works by institution and author id, flattens them into
//! (work, author, institution) rows and loads them idempotently.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use worksync_core::{CancelToken, ProgressContext};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "worksync")]
#[command(about = "Harvest OpenAlex works for an institution into DuckDB")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./worksync.toml or ~/.config/worksync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Retries per cursor after the first attempt
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Seconds to wait before each retry
    #[arg(long, global = true)]
    cooldown_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, flatten, load and purge
    Harvest(cmd::harvest::HarvestArgs),
    /// Delete excluded authors' rows from the database
    Purge(cmd::purge::PurgeArgs),
    /// Print the query URLs a harvest would fetch
    Url(cmd::url::UrlArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = Arc::new(ProgressContext::new());

    // TTY: warn unless --debug, the spinners show activity.
    // non-TTY: info, logs are the only progress indicator.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    worksync_core::init_logging(quiet, cli.debug, multi);

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli, progress: &Arc<ProgressContext>) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(n) = cli.max_retries {
        config.http.max_retries = n;
    }
    if let Some(secs) = cli.cooldown_secs {
        config.http.cooldown_secs = secs;
    }

    match cli.command {
        Command::Harvest(args) => {
            setup_signal_handler()?;
            cmd::harvest::run(args, &config, progress)
        }
        Command::Purge(args) => cmd::purge::run(args, &config),
        Command::Url(args) => cmd::url::run(args, &config),
        Command::Config => {
            cmd::print_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// First SIGINT/SIGTERM cancels the global token, a second one exits.
fn setup_signal_handler() -> Result<()> {
    // Initialise the token outside the handler.
    let token: &'static CancelToken = CancelToken::global();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // SAFETY: the handler only swaps an atomic and calls process::exit
        let registered = unsafe {
            signal_hook::low_level::register(signal, move || {
                if token.cancel_again() {
                    std::process::exit(130);
                }
            })
        };
        registered.with_context(|| format!("registering handler for signal {signal}"))?;
    }
    Ok(())
}
