//! Fan-out execution engine.
//!
//! The [`Dispatcher`] runs one command on a list of hosts with a bounded
//! number of concurrent workers. The [`Sequencer`](sequence::Sequencer) drives
//! the dispatcher through an ordered command list, dropping hosts at their
//! first failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_multicommand::connection::local::LocalTransport;
//! use remote_multicommand::executor::{Dispatcher, RunOptions};
//!
//! let mut dispatcher = Dispatcher::new(Box::new(LocalTransport::new(None)));
//! let report = dispatcher
//!     .dispatch("uptime", &["web01", "web02"], &RunOptions::new(10))
//!     .await?;
//! for (host, outcome) in report.iter() {
//!     println!("{}: {}", host, outcome.output);
//! }
//! ```

pub mod sequence;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::callback::{NullCallback, SharedCallback};
use crate::connection::{LogLevel, Transport};
use crate::error::{InputError, Result};
use crate::report::{CommandOutcome, DispatchReport};

pub use sequence::Sequencer;

/// Default number of concurrent workers
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Per-call execution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Upper bound on concurrent workers, clamped to the number of hosts
    pub max_concurrency: usize,
    /// Verbosity forwarded to transports and the logging callback
    pub log_level: LogLevel,
    /// Ask transports to verify each host's identity on connect
    pub verify_identity: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            log_level: LogLevel::default(),
            verify_identity: false,
        }
    }
}

impl RunOptions {
    /// Options with the given concurrency and defaults elsewhere
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Default::default()
        }
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Enable or disable identity verification
    pub fn verify_identity(mut self, verify: bool) -> Self {
        self.verify_identity = verify;
        self
    }

    /// Reject options that cannot run anything
    pub fn validate(&self) -> std::result::Result<(), InputError> {
        if self.max_concurrency == 0 {
            return Err(InputError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Check that a host list is non-empty and free of duplicates.
pub fn validate_hosts<S: AsRef<str>>(hosts: &[S]) -> std::result::Result<(), InputError> {
    if hosts.is_empty() {
        return Err(InputError::EmptyHostList);
    }
    let mut seen = HashSet::with_capacity(hosts.len());
    for host in hosts {
        let host = host.as_ref();
        if !seen.insert(host) {
            return Err(InputError::DuplicateHost(host.to_string()));
        }
    }
    Ok(())
}

/// Runs one command on many hosts, a batch of workers at a time.
///
/// Each worker slot owns one transport. Slots are created lazily from the
/// prototype transport's [`renew`](Transport::renew) and reused across batches
/// and calls, but every host still gets its own connect/execute/close cycle.
pub struct Dispatcher {
    prototype: Box<dyn Transport>,
    slots: Vec<Box<dyn Transport>>,
    callback: SharedCallback,
}

impl Dispatcher {
    /// Create a dispatcher around a prototype transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            prototype: transport,
            slots: Vec::new(),
            callback: Arc::new(NullCallback),
        }
    }

    /// Set the callback receiving progress events
    pub fn with_callback(mut self, callback: SharedCallback) -> Self {
        self.callback = callback;
        self
    }

    /// Replace the callback receiving progress events
    pub fn set_callback(&mut self, callback: SharedCallback) {
        self.callback = callback;
    }

    /// The callback in use
    pub fn callback(&self) -> &SharedCallback {
        &self.callback
    }

    /// Number of worker slots created so far
    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Run `command` once on every host.
    ///
    /// Hosts are processed in consecutive batches of
    /// `min(max_concurrency, hosts.len())`; a batch completes entirely before
    /// the next one starts. Failures on individual hosts are recorded in their
    /// outcome and never abort the dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`](crate::Error::MalformedInput) for an
    /// empty or duplicated host list or a zero concurrency, before any
    /// transport is touched.
    pub async fn dispatch<S: AsRef<str>>(
        &mut self,
        command: &str,
        hosts: &[S],
        options: &RunOptions,
    ) -> Result<DispatchReport> {
        options.validate()?;
        validate_hosts(hosts)?;
        let hosts: Vec<String> = hosts.iter().map(|h| h.as_ref().to_string()).collect();
        Ok(self.dispatch_validated(command, &hosts, options).await)
    }

    /// Dispatch to an already validated host list
    pub(crate) async fn dispatch_validated(
        &mut self,
        command: &str,
        hosts: &[String],
        options: &RunOptions,
    ) -> DispatchReport {
        let mut report = DispatchReport::new();
        if hosts.is_empty() {
            return report;
        }

        let workers = options.max_concurrency.min(hosts.len());
        self.prepare_slots(workers, options.log_level);
        let batch_count = hosts.chunks(workers).len();
        debug!(
            command = %command,
            hosts = hosts.len(),
            workers,
            batches = batch_count,
            "Dispatching command"
        );

        self.callback
            .on_dispatch_start(command, hosts.len(), batch_count)
            .await;
        let start = Instant::now();

        for (index, batch) in hosts.chunks(workers).enumerate() {
            self.callback.on_batch_start(index, batch).await;
            for (host, outcome) in self.run_batch(command, batch, options.verify_identity).await {
                self.callback.on_host_complete(&host, &outcome).await;
                report.insert(host, outcome);
            }
        }

        self.callback
            .on_dispatch_complete(command, hosts.len(), start.elapsed())
            .await;
        report
    }

    /// Make sure at least `workers` slots exist and share the run's log level
    fn prepare_slots(&mut self, workers: usize, level: LogLevel) {
        self.prototype.set_log_level(level);
        while self.slots.len() < workers {
            self.slots.push(self.prototype.renew());
        }
        for slot in &mut self.slots {
            slot.set_log_level(level);
        }
    }

    /// Run one batch and wait for every worker in it
    async fn run_batch(
        &mut self,
        command: &str,
        batch: &[String],
        verify_identity: bool,
    ) -> Vec<(String, CommandOutcome)> {
        let transports: Vec<_> = self.slots.drain(..batch.len()).collect();

        let (hosts, handles): (Vec<String>, Vec<JoinHandle<WorkerOutput>>) = batch
            .iter()
            .zip(transports)
            .map(|(host, transport)| {
                let job = HostJob {
                    host: host.clone(),
                    command: command.to_string(),
                    verify_identity,
                };
                (host.clone(), tokio::spawn(run_on_host(transport, job)))
            })
            .unzip();

        let mut outcomes = Vec::with_capacity(hosts.len());
        for (host, joined) in hosts.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(output) => {
                    self.slots.push(output.transport);
                    outcomes.push((output.host, output.outcome));
                }
                Err(e) => {
                    // The worker's transport went down with it
                    error!(host = %host, "Worker failed: {}", e);
                    self.slots.push(self.prototype.renew());
                    outcomes.push((
                        host,
                        CommandOutcome::unreachable(command, format!("Worker failed: {}", e)),
                    ));
                }
            }
        }
        outcomes
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.prototype.name())
            .field("workers", &self.slots.len())
            .finish()
    }
}

/// Everything a worker needs to process one host
struct HostJob {
    host: String,
    command: String,
    verify_identity: bool,
}

/// What a worker hands back: its result and its (possibly renewed) transport
struct WorkerOutput {
    host: String,
    outcome: CommandOutcome,
    transport: Box<dyn Transport>,
}

/// Connect, execute and close for a single host.
async fn run_on_host(mut transport: Box<dyn Transport>, job: HostJob) -> WorkerOutput {
    let outcome = match transport.connect(&job.host, job.verify_identity).await {
        Ok(()) => {
            let result = transport.execute(&job.command).await;
            if let Err(e) = transport.close().await {
                debug!(host = %job.host, "Failed to close session: {}", e);
            }
            CommandOutcome::from_execution(&job.command, result)
        }
        Err(e) => {
            if e.requires_reset() {
                trace!(host = %job.host, "Replacing transport after connect failure");
                transport = transport.renew();
            }
            CommandOutcome::unreachable(&job.command, e.to_string())
        }
    };

    WorkerOutput {
        host: job.host,
        outcome,
        transport,
    }
}
