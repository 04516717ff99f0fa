//! Subcommands module for the remote-multicommand CLI
//!
//! Each subcommand builds on a shared [`CommandContext`].

pub mod run;
pub mod script;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use anyhow::{bail, Context, Result};
use remote_multicommand::callback::{LogCallback, ProgressCallback, SharedCallback};
use remote_multicommand::config::Config;
use remote_multicommand::connection::{build_transport, Transport};
use remote_multicommand::executor::RunOptions;
use std::path::Path;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration with command-line overrides applied
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Target hosts, in the order given
    pub hosts: Vec<String>,
    /// Show a progress bar
    pub progress: bool,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, mut config: Config) -> Result<Self> {
        apply_cli_overrides(&mut config, cli)?;
        config.validate()?;

        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), config.colors.clone());

        let mut hosts = Vec::new();
        if let Some(path) = &cli.hosts_file {
            hosts.extend(read_hosts_file(path)?);
        }
        hosts.extend(
            cli.hosts
                .iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty())
                .map(String::from),
        );

        Ok(Self {
            config,
            output,
            hosts,
            progress: cli.progress,
        })
    }

    /// Run options for this invocation
    pub fn run_options(&self) -> RunOptions {
        self.config.run_options()
    }

    /// Build the prototype transport
    pub fn transport(&self) -> Result<Box<dyn Transport>> {
        build_transport(self.config.defaults.transport, self.config.to_ssh_settings())
            .context("Failed to set up transport")
    }

    /// The callback receiving run progress
    pub fn callback(&self) -> SharedCallback {
        if self.progress {
            Arc::new(ProgressCallback::new())
        } else {
            Arc::new(LogCallback::new(self.config.defaults.log_level))
        }
    }

    /// Exit code for a finished run
    pub fn exit_code(all_succeeded: bool) -> i32 {
        if all_succeeded {
            0
        } else {
            2
        }
    }
}

/// Command-line flags take precedence over configuration
fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(forks) = cli.forks {
        config.defaults.forks = forks;
    }
    if let Some(transport) = cli.transport {
        config.defaults.transport = transport;
    }
    if let Some(level) = cli.ssh_log_level {
        config.defaults.log_level = level;
    }
    if let Some(user) = &cli.user {
        config.ssh.user = user.clone();
    }
    if let Some(port) = cli.port {
        config.ssh.port = port;
    }
    if let Some(key) = &cli.private_key {
        config.ssh.private_key_file = Some(key.clone());
    }
    if let Some(var) = &cli.password_env {
        let password = std::env::var(var)
            .with_context(|| format!("Password variable '{}' is not set", var))?;
        config.ssh.password = Some(password);
    }
    if cli.no_dns_check {
        config.ssh.server_has_dns = Some(false);
    }
    if cli.no_color {
        config.colors.enabled = false;
    }
    Ok(())
}

/// Read a host list: one host per line, blank lines and `#` comments ignored
fn read_hosts_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        bail!("Hosts file not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hosts file: {}", path.display()))?;
    Ok(parse_host_list(&content))
}

fn parse_host_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
