//! remote-multicommand - Run shell commands on many hosts over SSH
//!
//! This is the main entry point for the remote-multicommand CLI.

mod cli;

use anyhow::{Context, Result};
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use remote_multicommand::config::{Config, LoggingConfig};
use remote_multicommand::connection::LogLevel;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<remote_multicommand::Error>()
                .map_or(1, remote_multicommand::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_ref())?;

    let log_level = cli.ssh_log_level.unwrap_or(config.defaults.log_level);
    init_logging(cli.verbosity(), log_level, &config.logging)?;
    debug!("remote-multicommand v{}", remote_multicommand::version());

    let mut ctx = CommandContext::new(cli, config)?;

    match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await,
        Commands::Script(args) => args.execute(&mut ctx).await,
    }
}

/// Default filter: the more verbose of `-v` and the run's log level
fn default_filter(verbosity: u8, level: LogLevel) -> &'static str {
    let from_verbosity = match verbosity {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 3,
    };
    let from_level = match level {
        LogLevel::Debug => 2,
        LogLevel::Info => 1,
        LogLevel::Error | LogLevel::Critical => 0,
    };
    match from_verbosity.max(from_level) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, level: LogLevel, logging: &LoggingConfig) -> Result<()> {
    let filter = default_filter(verbosity, level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match &logging.log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let (json_layer, text_layer) = if logging.json {
        (
            Some(fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .with(env_filter)
        .init();
    Ok(())
}
