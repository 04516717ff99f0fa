//! CLI module for remote-multicommand
//!
//! Argument parsing and subcommand dispatch.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use remote_multicommand::connection::{LogLevel, TransportKind};
use std::path::PathBuf;

/// Run shell commands on many hosts over SSH
#[derive(Parser, Debug, Clone)]
#[command(name = "remote-multicommand")]
#[command(version)]
#[command(about = "Run shell commands on many hosts over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Target hosts (comma-separated, repeatable)
    #[arg(short = 'H', long, global = true, value_delimiter = ',', action = clap::ArgAction::Append)]
    pub hosts: Vec<String>,

    /// File with one host per line
    #[arg(long, global = true)]
    pub hosts_file: Option<PathBuf>,

    /// Number of concurrent connections
    #[arg(short = 'f', long, global = true)]
    pub forks: Option<usize>,

    /// Remote user
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// Private key file
    #[arg(short = 'k', long, global = true)]
    pub private_key: Option<PathBuf>,

    /// SSH port
    #[arg(short = 'p', long, global = true)]
    pub port: Option<u16>,

    /// Read the SSH password from this environment variable
    #[arg(long, global = true, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Skip the DNS and hostname identity checks
    #[arg(long, global = true)]
    pub no_dns_check: bool,

    /// Transport to use
    #[arg(long, global = true)]
    pub transport: Option<TransportKind>,

    /// Verbosity of SSH sessions and progress logs
    #[arg(long, global = true)]
    pub ssh_log_level: Option<LogLevel>,

    /// Show a progress bar instead of progress logs
    #[arg(long, global = true)]
    pub progress: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "RMC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one command on every host
    Run(commands::run::RunArgs),

    /// Run a list of commands, dropping hosts at their first failure
    Script(commands::script::ScriptArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
