//! Configuration module for remote-multicommand
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/remote-multicommand/config.toml)
//! - User configuration (~/.config/remote-multicommand/config.toml)
//! - Project configuration (./remote-multicommand.toml)
//! - Environment variables
//! - Command-line arguments (applied by the CLI)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::connection::{
    LogLevel, SshSettings, TransportKind, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT,
};
use crate::error::Error;
use crate::executor::{RunOptions, DEFAULT_MAX_CONCURRENCY};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// SSH settings
    pub ssh: SshConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,
}

/// Default run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Number of concurrent workers
    pub forks: usize,

    /// Verbosity of transports and progress logs
    pub log_level: LogLevel,

    /// Transport implementation
    pub transport: TransportKind,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            forks: DEFAULT_MAX_CONCURRENCY,
            log_level: LogLevel::default(),
            transport: TransportKind::default(),
        }
    }
}

/// SSH settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Remote user
    pub user: String,

    /// SSH port
    pub port: u16,

    /// Private key file
    pub private_key_file: Option<PathBuf>,

    /// Password, or passphrase for the private key
    #[serde(skip_serializing)]
    pub password: Option<String>,

    // Unset until some layer names them
    /// Whether target hosts are registered in DNS and must pass identity checks
    /// (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_has_dns: Option<bool>,

    /// Try the SSH agent first (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_agent: Option<bool>,

    /// Reject hosts missing from known_hosts (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_host_key_checking: Option<bool>,

    /// Timeout for connecting and authenticating
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for a single command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: DEFAULT_PORT,
            private_key_file: None,
            password: None,
            server_has_dns: None,
            use_agent: None,
            strict_host_key_checking: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: None,
        }
    }
}

impl SshConfig {
    /// Effective identity check switch
    pub fn server_has_dns(&self) -> bool {
        self.server_has_dns.unwrap_or(true)
    }

    /// Effective agent switch
    pub fn use_agent(&self) -> bool {
        self.use_agent.unwrap_or(true)
    }

    /// Effective known_hosts strictness
    pub fn strict_host_key_checking(&self) -> bool {
        self.strict_host_key_checking.unwrap_or(false)
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    pub log_path: Option<PathBuf>,

    /// Emit logs as JSON
    pub json: bool,
}

/// Colors configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,

    /// Host name color
    pub highlight: String,

    /// OK color
    pub ok: String,

    /// Failed color
    pub failed: String,

    /// Unreachable color
    pub unreachable: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            highlight: "white".to_string(),
            ok: "green".to_string(),
            failed: "red".to_string(),
            unreachable: "bright_red".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            } else if config_path == Some(&path) {
                return Err(Error::FileNotFound(path).into());
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path replaces the search
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/remote-multicommand/config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("remote-multicommand/config.toml"));
        }

        paths.push(PathBuf::from("remote-multicommand.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file_config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one
    fn merge(&self, other: Config) -> Config {
        let defaults = Defaults::default();
        let ssh = SshConfig::default();

        // Other takes precedence for non-default values
        Config {
            defaults: Defaults {
                forks: if other.defaults.forks != defaults.forks {
                    other.defaults.forks
                } else {
                    self.defaults.forks
                },
                log_level: if other.defaults.log_level != defaults.log_level {
                    other.defaults.log_level
                } else {
                    self.defaults.log_level
                },
                transport: if other.defaults.transport != defaults.transport {
                    other.defaults.transport
                } else {
                    self.defaults.transport
                },
            },
            ssh: SshConfig {
                user: if other.ssh.user != ssh.user {
                    other.ssh.user
                } else {
                    self.ssh.user.clone()
                },
                port: if other.ssh.port != ssh.port {
                    other.ssh.port
                } else {
                    self.ssh.port
                },
                private_key_file: other
                    .ssh
                    .private_key_file
                    .or_else(|| self.ssh.private_key_file.clone()),
                password: other.ssh.password.or_else(|| self.ssh.password.clone()),
                server_has_dns: other.ssh.server_has_dns.or(self.ssh.server_has_dns),
                use_agent: other.ssh.use_agent.or(self.ssh.use_agent),
                strict_host_key_checking: other
                    .ssh
                    .strict_host_key_checking
                    .or(self.ssh.strict_host_key_checking),
                connect_timeout: if other.ssh.connect_timeout != ssh.connect_timeout {
                    other.ssh.connect_timeout
                } else {
                    self.ssh.connect_timeout
                },
                command_timeout: other.ssh.command_timeout.or(self.ssh.command_timeout),
            },
            logging: LoggingConfig {
                log_path: other
                    .logging
                    .log_path
                    .or_else(|| self.logging.log_path.clone()),
                json: other.logging.json || self.logging.json,
            },
            colors: other.colors,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // RMC_FORKS
        if let Ok(forks) = std::env::var("RMC_FORKS") {
            if let Ok(n) = forks.parse() {
                self.defaults.forks = n;
            }
        }

        // RMC_LOG_LEVEL
        if let Ok(level) = std::env::var("RMC_LOG_LEVEL") {
            if let Ok(level) = level.parse() {
                self.defaults.log_level = level;
            }
        }

        // RMC_SSH_USER
        if let Ok(user) = std::env::var("RMC_SSH_USER") {
            self.ssh.user = user;
        }

        // RMC_SSH_PORT
        if let Ok(port) = std::env::var("RMC_SSH_PORT") {
            if let Ok(port) = port.parse() {
                self.ssh.port = port;
            }
        }

        // RMC_SSH_KEY
        if let Ok(file) = std::env::var("RMC_SSH_KEY") {
            self.ssh.private_key_file = Some(PathBuf::from(file));
        }

        // RMC_SSH_PASSWORD
        if let Ok(password) = std::env::var("RMC_SSH_PASSWORD") {
            self.ssh.password = Some(password);
        }

        // RMC_SERVER_HAS_DNS
        if let Ok(value) = std::env::var("RMC_SERVER_HAS_DNS") {
            self.ssh.server_has_dns = Some(!matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ));
        }

        // RMC_LOG_PATH
        if let Ok(path) = std::env::var("RMC_LOG_PATH") {
            self.logging.log_path = Some(PathBuf::from(path));
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Reject values no run could use
    pub fn validate(&self) -> crate::Result<()> {
        if self.defaults.forks == 0 {
            return Err(Error::invalid_config("defaults.forks", "must be at least 1"));
        }
        if self.ssh.port == 0 {
            return Err(Error::invalid_config("ssh.port", "must not be 0"));
        }
        if self.defaults.transport == TransportKind::Ssh
            && !self.ssh.use_agent()
            && self.ssh.private_key_file.is_none()
            && self.ssh.password.is_none()
        {
            return Err(Error::Config(
                "no SSH authentication method: set ssh.private_key_file, ssh.password \
                 or enable ssh.use_agent"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the SSH transport
    pub fn to_ssh_settings(&self) -> SshSettings {
        SshSettings {
            user: self.ssh.user.clone(),
            port: self.ssh.port,
            private_key: self.ssh.private_key_file.clone(),
            password: self.ssh.password.clone(),
            use_agent: self.ssh.use_agent(),
            strict_host_key_checking: self.ssh.strict_host_key_checking(),
            connect_timeout: self.ssh.connect_timeout,
            command_timeout: self.ssh.command_timeout,
        }
    }

    /// Run options derived from the defaults
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.defaults.forks)
            .log_level(self.defaults.log_level)
            .verify_identity(self.ssh.server_has_dns())
    }

    /// Load from a specific file only
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        Config::default().merge_from_file(&path_buf)
    }
}
