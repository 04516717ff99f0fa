//! Russh transport
//!
//! SSH sessions built on the russh crate. One session per host: `connect`
//! performs the TCP connect, handshake, host key check, authentication and
//! the optional DNS identity check; `execute` opens a channel for one command;
//! `close` disconnects.

use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh::keys::key::PublicKey;
use russh::keys::load_secret_key;
use russh::ChannelMsg;
use russh_keys::agent::client::AgentClient;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use super::{
    CommandResult, ConnectionError, ConnectionResult, LogLevel, SshSettings, Transport,
};

/// Russh-related error type - wraps russh::Error for the Handler trait
#[derive(Debug)]
pub struct RusshError(pub ::russh::Error);

impl From<::russh::Error> for RusshError {
    fn from(err: ::russh::Error) -> Self {
        RusshError(err)
    }
}

impl std::fmt::Display for RusshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Russh error: {}", self.0)
    }
}

impl std::error::Error for RusshError {}

/// Client handler checking server keys against known_hosts
struct ClientHandler {
    host: String,
    port: u16,
    /// Whether to accept hosts missing from known_hosts
    accept_unknown: bool,
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = RusshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => {
                debug!(host = %self.host, "Host key verified against known_hosts");
                Ok(true)
            }
            Ok(false) if self.accept_unknown => {
                warn!(
                    host = %self.host,
                    "Host not found in known_hosts, accepting (first connection)"
                );
                Ok(true)
            }
            Ok(false) => {
                warn!(host = %self.host, "Host not found in known_hosts, rejecting");
                Ok(false)
            }
            Err(e) => {
                warn!(
                    host = %self.host,
                    error = %e,
                    "HOST KEY VERIFICATION FAILED! Server key does not match known_hosts entry."
                );
                Ok(false)
            }
        }
    }
}

/// SSH transport holding at most one open session
pub struct SshTransport {
    settings: SshSettings,
    log_level: LogLevel,
    /// `user@host:port` of the open session
    identifier: Option<String>,
    handle: Option<Handle<ClientHandler>>,
}

impl SshTransport {
    /// Create a transport with the given settings and no session
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            log_level: LogLevel::default(),
            identifier: None,
            handle: None,
        }
    }

    /// Settings this transport was built with
    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }

    fn debug_enabled(&self) -> bool {
        self.log_level.allows(LogLevel::Debug)
    }

    /// Resolve the host, failing with an identity mismatch when it is unknown to DNS
    async fn check_dns(&self, host: &str) -> ConnectionResult<()> {
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }
        let resolved = match tokio::net::lookup_host((host, self.settings.port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(_) => false,
        };
        if resolved {
            Ok(())
        } else {
            Err(ConnectionError::IdentityMismatch(format!(
                "{} is not registered in DNS domain",
                host
            )))
        }
    }

    /// Compare the remote `hostname` with the name we connected to
    async fn check_remote_hostname(&self, host: &str) -> ConnectionResult<()> {
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }
        let result = self.run_channel("hostname").await?;
        let remote = result.stdout.trim();
        if short_name(remote).eq_ignore_ascii_case(short_name(host)) {
            Ok(())
        } else {
            Err(ConnectionError::IdentityMismatch(format!(
                "{} reports hostname '{}'",
                host, remote
            )))
        }
    }

    async fn do_connect(&self, host: &str) -> ConnectionResult<Handle<ClientHandler>> {
        let timeout = self.settings.connect_timeout;
        let port = self.settings.port;

        let mut config = russh::client::Config::default();
        config.inactivity_timeout = Some(timeout);
        let config = Arc::new(config);

        let addr = format!("{}:{}", host, port);
        let socket = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))?
            .map_err(|e| {
                ConnectionError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, e))
            })?;

        socket.set_nodelay(true).map_err(|e| {
            ConnectionError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
        })?;

        let handler = ClientHandler {
            host: host.to_string(),
            port,
            accept_unknown: !self.settings.strict_host_key_checking,
        };

        let mut session = russh::client::connect_stream(config, socket, handler)
            .await
            .map_err(|e| match e.0 {
                russh::Error::UnknownKey => ConnectionError::HostKeyRejected(host.to_string()),
                other => {
                    ConnectionError::ConnectionFailed(format!("SSH handshake failed: {}", other))
                }
            })?;

        self.authenticate(&mut session).await?;
        Ok(session)
    }

    /// Try agent, then the configured key, then the password
    async fn authenticate(&self, session: &mut Handle<ClientHandler>) -> ConnectionResult<()> {
        let user = self.settings.user.as_str();

        if self.settings.use_agent && try_agent_auth(session, user).await.is_ok() {
            trace!("Authenticated using SSH agent");
            return Ok(());
        }

        if let Some(key) = &self.settings.private_key {
            let key_path = expand_path(key);
            let passphrase = self.settings.password.as_deref();
            match try_key_auth(session, user, &key_path, passphrase).await {
                Ok(()) => {
                    trace!(key = %key_path.display(), "Authenticated using key");
                    return Ok(());
                }
                Err(e) => trace!(error = %e, "Key authentication failed"),
            }
        }

        if let Some(password) = &self.settings.password {
            let authenticated = session
                .authenticate_password(user, password)
                .await
                .map_err(|e| {
                    ConnectionError::AuthenticationFailed(format!(
                        "Password authentication failed: {}",
                        e
                    ))
                })?;
            if authenticated {
                trace!("Authenticated using password");
                return Ok(());
            }
        }

        Err(ConnectionError::AuthenticationFailed(format!(
            "All authentication methods failed for user '{}'",
            user
        )))
    }

    /// Run one command on a fresh channel of the open session
    async fn run_channel(&self, command: &str) -> ConnectionResult<CommandResult> {
        let handle = self.handle.as_ref().ok_or(ConnectionError::NotConnected)?;

        let mut channel = handle.channel_open_session().await.map_err(|e| {
            ConnectionError::ExecutionFailed(format!("Failed to open channel: {}", e))
        })?;

        channel.exec(true, command).await.map_err(|e| {
            ConnectionError::ExecutionFailed(format!("Failed to execute command: {}", e))
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // Extended data type 1 is stderr
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let _ = channel.eof().await;

        // Unknown exit status counts as failure
        let exit_code = exit_code.map(|e| e as i32).unwrap_or(i32::MAX);
        trace!(exit_code = %exit_code, "Command completed");

        Ok(CommandResult::from_exit_code(
            exit_code,
            String::from_utf8_lossy(&stdout).to_string(),
            String::from_utf8_lossy(&stderr).to_string(),
        ))
    }
}

#[async_trait]
impl Transport for SshTransport {
    fn name(&self) -> &str {
        "ssh"
    }

    async fn connect(&mut self, host: &str, verify_identity: bool) -> ConnectionResult<()> {
        if self.handle.is_some() {
            self.close().await?;
        }

        let identifier = format!("{}@{}:{}", self.settings.user, host, self.settings.port);
        if self.debug_enabled() {
            debug!(target_host = %identifier, verify_identity, "Connecting via SSH");
        }

        if verify_identity {
            self.check_dns(host).await?;
        }

        let handle = match self.do_connect(host).await {
            Ok(handle) => handle,
            Err(e) => {
                if self.log_level.allows(LogLevel::Error) {
                    error!(target_host = %identifier, error = %e, "SSH connection failed");
                }
                return Err(e);
            }
        };
        self.handle = Some(handle);
        self.identifier = Some(identifier);

        if verify_identity {
            if let Err(e) = self.check_remote_hostname(host).await {
                let _ = self.close().await;
                return Err(e);
            }
        }

        if self.log_level.allows(LogLevel::Info) {
            info!(
                target_host = %self.identifier.as_deref().unwrap_or(host),
                "SSH session established"
            );
        }
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> ConnectionResult<CommandResult> {
        if self.debug_enabled() {
            debug!(
                target_host = %self.identifier.as_deref().unwrap_or("-"),
                command = %command,
                "Executing remote command"
            );
        }

        match self.settings.command_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run_channel(command))
                .await
                .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))?,
            None => self.run_channel(command).await,
        }
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if let Some(handle) = self.handle.take() {
            if self.debug_enabled() {
                debug!(
                    target_host = %self.identifier.as_deref().unwrap_or("-"),
                    "Closing SSH session"
                );
            }
            let _ = handle
                .disconnect(
                    russh::Disconnect::ByApplication,
                    "Connection closed by client",
                    "en",
                )
                .await;
        }
        self.identifier = None;
        Ok(())
    }

    fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    fn renew(&self) -> Box<dyn Transport> {
        let mut fresh = SshTransport::new(self.settings.clone());
        fresh.log_level = self.log_level;
        Box::new(fresh)
    }
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("user", &self.settings.user)
            .field("port", &self.settings.port)
            .field("session", &self.identifier)
            .finish()
    }
}

/// Try SSH agent authentication with every identity the agent offers
async fn try_agent_auth(session: &mut Handle<ClientHandler>, user: &str) -> ConnectionResult<()> {
    let mut agent = AgentClient::connect_env().await.map_err(|e| {
        ConnectionError::AuthenticationFailed(format!("Failed to connect to SSH agent: {}", e))
    })?;

    let identities = agent.request_identities().await.map_err(|e| {
        ConnectionError::AuthenticationFailed(format!("Failed to get agent identities: {}", e))
    })?;

    for identity in identities {
        let (returned_agent, result) = session.authenticate_future(user, identity, agent).await;
        agent = returned_agent;
        if let Ok(true) = result {
            return Ok(());
        }
    }

    Err(ConnectionError::AuthenticationFailed(
        "All SSH agent identities rejected".to_string(),
    ))
}

/// Try key-based authentication with an optional passphrase
async fn try_key_auth(
    session: &mut Handle<ClientHandler>,
    user: &str,
    key_path: &Path,
    passphrase: Option<&str>,
) -> ConnectionResult<()> {
    if !key_path.exists() {
        return Err(ConnectionError::AuthenticationFailed(format!(
            "Key file not found: {}",
            key_path.display()
        )));
    }

    let key_pair = load_secret_key(key_path, passphrase).map_err(|e| {
        ConnectionError::AuthenticationFailed(format!(
            "Failed to load key {}: {}",
            key_path.display(),
            e
        ))
    })?;

    let authenticated = session
        .authenticate_publickey(user, Arc::new(key_pair))
        .await
        .map_err(|e| {
            ConnectionError::AuthenticationFailed(format!(
                "Key authentication failed for {}: {}",
                key_path.display(),
                e
            ))
        })?;

    if authenticated {
        Ok(())
    } else {
        Err(ConnectionError::AuthenticationFailed(
            "Key authentication failed".to_string(),
        ))
    }
}

fn expand_path(path: &Path) -> std::path::PathBuf {
    let raw = path.to_string_lossy();
    std::path::PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// First DNS label of a host name
fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
