//! Transport layer for remote command execution.
//!
//! The fan-out engine talks to hosts only through the [`Transport`] trait:
//! open a session to one host, run one command, close. Each worker slot of the
//! [`Dispatcher`](crate::executor::Dispatcher) owns its transport exclusively,
//! so implementations are free to keep per-session state in `&mut self`.
//!
//! # Supported Transports
//!
//! - **SSH** (via `russh`, default feature): key, agent or password
//!   authentication, `known_hosts` checking and optional DNS identity checks.
//! - **Local**: runs commands through `sh -c` on the control node, ignoring the
//!   host name. Useful for smoke tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_multicommand::connection::{SshSettings, Transport};
//! use remote_multicommand::connection::russh::SshTransport;
//!
//! let mut transport = SshTransport::new(SshSettings::default().user("admin"));
//! transport.connect("web01.example.com", true).await?;
//! let result = transport.execute("uptime").await?;
//! transport.close().await?;
//! ```

/// Local execution transport.
pub mod local;

/// Pure Rust SSH transport using russh.
#[cfg(feature = "russh")]
pub mod russh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while opening a session or running a command.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The host is not part of the expected identity domain.
    ///
    /// This is an expected condition (for example a host that is not registered
    /// in DNS while identity verification is on) and leaves the transport
    /// usable.
    #[error("Host identity mismatch: {0}")]
    IdentityMismatch(String),

    /// Failed to establish the network connection or SSH handshake.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the remote host.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server's host key did not pass verification.
    #[error("Host key verification failed for {0}")]
    HostKeyRejected(String),

    /// Command execution failed (not to be confused with non-zero exit code).
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Connection or command timed out.
    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    /// An operation needed an open session but there is none.
    #[error("Not connected")]
    NotConnected,

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Whether the transport that produced this error must be replaced
    /// before it is used again.
    ///
    /// Everything except an identity mismatch can leave a session library in
    /// a broken internal state after a failed handshake.
    pub fn requires_reset(&self) -> bool {
        !matches!(self, ConnectionError::IdentityMismatch(_))
    }
}

/// Result type for transport operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// The result of executing a command on an open session.
///
/// # Example
///
/// ```rust
/// use remote_multicommand::connection::CommandResult;
///
/// let result = CommandResult::success("Hello".into(), String::new());
/// assert!(result.success);
/// assert_eq!(result.exit_code, 0);
///
/// let failed = CommandResult::failure(1, String::new(), "error".into());
/// assert!(!failed.success);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code of the command (0 typically indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Convenience flag: `true` if `exit_code == 0`.
    pub success: bool,
}

impl CommandResult {
    /// Create a new successful command result
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a new failed command result
    pub fn failure(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }

    /// Build a result from an exit code
    pub fn from_exit_code(exit_code: i32, stdout: String, stderr: String) -> Self {
        if exit_code == 0 {
            Self::success(stdout, stderr)
        } else {
            Self::failure(exit_code, stdout, stderr)
        }
    }
}

/// Verbosity of a transport's own diagnostics and of the run progress logs.
///
/// Only observational: it never changes what gets executed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-host connection chatter
    Debug,
    /// Progress information
    Info,
    /// Failures only
    Error,
    /// Nothing but fatal conditions
    #[default]
    Critical,
}

impl LogLevel {
    /// Whether a message at `level` should be emitted under this threshold.
    pub fn allows(self, level: LogLevel) -> bool {
        level >= self
    }

    /// Get the plain string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(format!(
                "unknown log level '{}', expected DEBUG, INFO, ERROR or CRITICAL",
                other
            )),
        }
    }
}

/// The remote-execution capability the dispatcher drives.
///
/// A dispatcher worker calls `connect`, then `execute` once, then `close`, for
/// every host it is handed. Connections are never reused across hosts.
#[async_trait]
pub trait Transport: Send {
    /// Short transport name used in logs
    fn name(&self) -> &str;

    /// Open a session to `host`, optionally verifying the host's identity
    async fn connect(&mut self, host: &str, verify_identity: bool) -> ConnectionResult<()>;

    /// Execute a single command on the open session
    async fn execute(&mut self, command: &str) -> ConnectionResult<CommandResult>;

    /// Close the session, if any
    async fn close(&mut self) -> ConnectionResult<()>;

    /// Set the verbosity of the transport's own diagnostics
    fn set_log_level(&mut self, level: LogLevel);

    /// Return a fresh instance with the same configuration and no session.
    ///
    /// The dispatcher calls this instead of constructing transports itself,
    /// both to fill worker slots and to replace a transport whose connect
    /// attempt failed with an error that [requires a reset](ConnectionError::requires_reset).
    fn renew(&self) -> Box<dyn Transport>;
}

/// Which transport implementation to use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// SSH via russh
    #[default]
    Ssh,
    /// Local `sh -c` execution
    Local,
}

/// Settings forwarded to the SSH transport at construction.
///
/// They are opaque to the fan-out engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Remote user name
    pub user: String,
    /// SSH port
    pub port: u16,
    /// Private key used for authentication
    pub private_key: Option<PathBuf>,
    /// Password for password authentication, or key passphrase
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Try the SSH agent before keys and passwords
    pub use_agent: bool,
    /// Reject hosts missing from known_hosts
    pub strict_host_key_checking: bool,
    /// Timeout for the TCP connect and handshake
    pub connect_timeout: Duration,
    /// Timeout for a single command, if any
    pub command_timeout: Option<Duration>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: DEFAULT_PORT,
            private_key: None,
            password: None,
            use_agent: true,
            strict_host_key_checking: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: None,
        }
    }
}

impl SshSettings {
    /// Set the user
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the private key path
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }
}

/// Build a transport prototype of the requested kind.
pub fn build_transport(
    kind: TransportKind,
    settings: SshSettings,
) -> ConnectionResult<Box<dyn Transport>> {
    match kind {
        TransportKind::Local => Ok(Box::new(local::LocalTransport::new(
            settings.command_timeout,
        ))),
        TransportKind::Ssh => {
            #[cfg(feature = "russh")]
            {
                Ok(Box::new(russh::SshTransport::new(settings)))
            }
            #[cfg(not(feature = "russh"))]
            {
                let _ = settings;
                Err(ConnectionError::InvalidConfig(
                    "No SSH backend available. Enable the 'russh' feature.".to_string(),
                ))
            }
        }
    }
}
