//! Shared test utilities for the remote-multicommand test suite.
//!
//! This module provides:
//! - [`MockTransport`], a scripted [`Transport`] whose instances share one
//!   [`MockState`] so tests can observe every instance the dispatcher creates
//! - [`RecordingCallback`], a callback that journals every event
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//!
//! let state = MockState::new();
//! state.fail_command("web02", "cmd1");
//! let mut dispatcher = Dispatcher::new(state.prototype());
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use remote_multicommand::callback::RunCallback;
use remote_multicommand::connection::{
    CommandResult, ConnectionError, ConnectionResult, LogLevel, Transport,
};
use remote_multicommand::report::{CommandOutcome, HostSummary};

// ============================================================================
// Mock Transport
// ============================================================================

/// How a scripted connect attempt fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The host is outside the identity domain
    Identity,
    /// Any other connection problem
    Refused,
}

/// One call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `connect(host)` on instance `instance`
    Connect { instance: usize, host: String },
    /// `execute(command)` on a session to `host`
    Execute { host: String, command: String },
    /// `close()` on a session to `host`
    Close { host: String },
}

/// Behavior and observations shared by every mock instance.
#[derive(Debug, Default)]
pub struct MockState {
    instances: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: RwLock<Vec<Call>>,
    log_levels: RwLock<Vec<LogLevel>>,
    connect_failures: RwLock<HashMap<String, ConnectFailure>>,
    command_failures: RwLock<HashSet<(String, String)>>,
    panics: RwLock<HashSet<String>>,
    delay: RwLock<Duration>,
}

impl MockState {
    /// Create a state where every host accepts every command.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A prototype transport for a dispatcher. Not counted as an instance.
    pub fn prototype(self: &Arc<Self>) -> Box<dyn Transport> {
        Box::new(MockTransport {
            state: Arc::clone(self),
            id: 0,
            session: None,
            log_level: LogLevel::default(),
        })
    }

    /// Make every connect to `host` fail.
    pub fn fail_connect(&self, host: &str, kind: ConnectFailure) {
        self.connect_failures.write().insert(host.to_string(), kind);
    }

    /// Make `command` exit non-zero on `host`.
    pub fn fail_command(&self, host: &str, command: &str) {
        self.command_failures
            .write()
            .insert((host.to_string(), command.to_string()));
    }

    /// Make `execute` panic on `host`.
    pub fn panic_on(&self, host: &str) {
        self.panics.write().insert(host.to_string());
    }

    /// Make `execute` take this long.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = delay;
    }

    /// Transports created through `renew`.
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    /// Largest number of commands executing at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Every call, in the order observed.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.read().clone()
    }

    /// Total number of transport calls.
    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    /// Commands executed on `host`, in order.
    pub fn executed_on(&self, host: &str) -> Vec<String> {
        self.calls
            .read()
            .iter()
            .filter_map(|call| match call {
                Call::Execute { host: h, command } if h == host => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Instance ids that attempted to connect to `host`, in order.
    pub fn connect_instances(&self, host: &str) -> Vec<usize> {
        self.calls
            .read()
            .iter()
            .filter_map(|call| match call {
                Call::Connect { instance, host: h } if h == host => Some(*instance),
                _ => None,
            })
            .collect()
    }

    /// Log levels set on any instance.
    pub fn log_levels(&self) -> Vec<LogLevel> {
        self.log_levels.read().clone()
    }
}

/// A transport driven by a shared [`MockState`].
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<MockState>,
    id: usize,
    session: Option<String>,
    log_level: LogLevel,
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self, host: &str, _verify_identity: bool) -> ConnectionResult<()> {
        self.state.calls.write().push(Call::Connect {
            instance: self.id,
            host: host.to_string(),
        });

        let failure = self.state.connect_failures.read().get(host).copied();
        match failure {
            Some(ConnectFailure::Identity) => Err(ConnectionError::IdentityMismatch(format!(
                "{} is not registered in DNS domain",
                host
            ))),
            Some(ConnectFailure::Refused) => Err(ConnectionError::ConnectionFailed(format!(
                "{} refused the connection",
                host
            ))),
            None => {
                self.session = Some(host.to_string());
                Ok(())
            }
        }
    }

    async fn execute(&mut self, command: &str) -> ConnectionResult<CommandResult> {
        let host = self.session.clone().ok_or(ConnectionError::NotConnected)?;
        self.state.calls.write().push(Call::Execute {
            host: host.clone(),
            command: command.to_string(),
        });

        if self.state.panics.read().contains(&host) {
            panic!("mock transport crashed on {}", host);
        }

        let running = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(running, Ordering::SeqCst);
        let delay = *self.state.delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .state
            .command_failures
            .read()
            .contains(&(host.clone(), command.to_string()));
        if failed {
            Ok(CommandResult::failure(
                1,
                String::new(),
                format!("{} failed on {}", command, host),
            ))
        } else {
            Ok(CommandResult::success(
                format!("{} on {}", command, host),
                String::new(),
            ))
        }
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if let Some(host) = self.session.take() {
            self.state.calls.write().push(Call::Close { host });
        }
        Ok(())
    }

    fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
        self.state.log_levels.write().push(level);
    }

    fn renew(&self) -> Box<dyn Transport> {
        let id = self.state.instances.fetch_add(1, Ordering::SeqCst) + 1;
        Box::new(MockTransport {
            state: Arc::clone(&self.state),
            id,
            session: None,
            log_level: self.log_level,
        })
    }
}

// ============================================================================
// Recording Callback
// ============================================================================

/// An event observed by [`RecordingCallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DispatchStart { command: String, hosts: usize, batches: usize },
    BatchStart { index: usize, hosts: Vec<String> },
    HostComplete { host: String, succeeded: bool },
    DispatchComplete { command: String },
    SequenceStart { commands: usize, hosts: usize },
    HostDropped { host: String, command: String },
    SequenceComplete { summaries: Vec<HostSummary> },
}

/// Callback that journals every event it receives.
#[derive(Debug, Default)]
pub struct RecordingCallback {
    events: RwLock<Vec<Event>>,
}

impl RecordingCallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    fn push(&self, event: Event) {
        self.events.write().push(event);
    }
}

#[async_trait]
impl RunCallback for RecordingCallback {
    async fn on_dispatch_start(&self, command: &str, host_count: usize, batch_count: usize) {
        self.push(Event::DispatchStart {
            command: command.to_string(),
            hosts: host_count,
            batches: batch_count,
        });
    }

    async fn on_batch_start(&self, index: usize, hosts: &[String]) {
        self.push(Event::BatchStart {
            index,
            hosts: hosts.to_vec(),
        });
    }

    async fn on_host_complete(&self, host: &str, outcome: &CommandOutcome) {
        self.push(Event::HostComplete {
            host: host.to_string(),
            succeeded: outcome.succeeded,
        });
    }

    async fn on_dispatch_complete(&self, command: &str, _host_count: usize, _elapsed: Duration) {
        self.push(Event::DispatchComplete {
            command: command.to_string(),
        });
    }

    async fn on_sequence_start(&self, command_count: usize, host_count: usize) {
        self.push(Event::SequenceStart {
            commands: command_count,
            hosts: host_count,
        });
    }

    async fn on_host_dropped(&self, host: &str, command: &str) {
        self.push(Event::HostDropped {
            host: host.to_string(),
            command: command.to_string(),
        });
    }

    async fn on_sequence_complete(&self, summaries: &[HostSummary], _elapsed: Duration) {
        self.push(Event::SequenceComplete {
            summaries: summaries.to_vec(),
        });
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Host names `host0`, `host1`, ...
pub fn hosts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("host{}", i)).collect()
}
