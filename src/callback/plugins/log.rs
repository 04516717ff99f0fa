//! Logging callback plugin.
//!
//! Emits run progress through `tracing`, filtered by the run's [`LogLevel`]
//! before it reaches the subscriber. With the default `CRITICAL` level the
//! plugin is silent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::callback::RunCallback;
use crate::connection::LogLevel;
use crate::report::{CommandOutcome, HostSummary};

/// Callback that logs dispatch progress, failures and run summaries.
#[derive(Debug, Default)]
pub struct LogCallback {
    level: LogLevel,
    /// Hosts in the current dispatch
    total: AtomicUsize,
    /// Hosts of the current dispatch that already completed
    processed: AtomicUsize,
    /// Commands in the current sequential run
    command_count: AtomicUsize,
}

impl LogCallback {
    /// Create a log callback with the given threshold.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// The threshold in use
    pub fn level(&self) -> LogLevel {
        self.level
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.level.allows(level)
    }
}

#[async_trait]
impl RunCallback for LogCallback {
    async fn on_dispatch_start(&self, command: &str, host_count: usize, batch_count: usize) {
        self.total.store(host_count, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
        if self.enabled(LogLevel::Info) {
            info!(
                command = %command,
                "Processing in the {} servers will be done in {} iterations.",
                host_count, batch_count
            );
        }
    }

    async fn on_batch_start(&self, index: usize, hosts: &[String]) {
        if !self.enabled(LogLevel::Debug) {
            return;
        }
        if index > 0 {
            let remaining = self
                .total
                .load(Ordering::SeqCst)
                .saturating_sub(self.processed.load(Ordering::SeqCst));
            debug!("Still has {} servers to process...", remaining);
        }
        debug!(iteration = index + 1, "Processing {} servers in this iteration.", hosts.len());
        debug!("Servers: {:?}", hosts);
    }

    async fn on_host_complete(&self, host: &str, outcome: &CommandOutcome) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if outcome.succeeded || !self.enabled(LogLevel::Error) {
            return;
        }
        if outcome.access_granted {
            error!(
                host = %host,
                "Error executing command: \"{}\" in server {} :{}",
                outcome.command,
                host,
                outcome.output.trim_end()
            );
        } else {
            error!(
                host = %host,
                "Cannot connect to server {} :{}",
                host,
                outcome.output.trim_end()
            );
        }
    }

    async fn on_dispatch_complete(&self, command: &str, host_count: usize, elapsed: Duration) {
        if self.enabled(LogLevel::Info) {
            info!(
                "It took {:.3} seconds to execute command '{}' in all {} servers.",
                elapsed.as_secs_f64(),
                command,
                host_count
            );
        }
    }

    async fn on_sequence_start(&self, command_count: usize, host_count: usize) {
        self.command_count.store(command_count, Ordering::SeqCst);
        if self.enabled(LogLevel::Info) {
            info!(
                hosts = host_count,
                "Executing {} commands in the list of servers:", command_count
            );
        }
    }

    async fn on_host_dropped(&self, host: &str, command: &str) {
        if self.enabled(LogLevel::Error) {
            error!(
                "Command \"{}\" returned error. Removing server {} from execution list",
                command, host
            );
        }
    }

    async fn on_sequence_complete(&self, summaries: &[HostSummary], elapsed: Duration) {
        if !self.enabled(LogLevel::Info) {
            return;
        }
        let command_count = self.command_count.load(Ordering::SeqCst);
        for summary in summaries {
            info!(
                "Server {}:\n - All {} commands were issued: {}\n - Number of commands issued: {}\n - Number of commands bypassed: {}",
                summary.host,
                command_count,
                if summary.all_issued() { "Yes" } else { "No" },
                summary.issued,
                summary.bypassed
            );
        }
        info!(
            "It took {:.3} seconds to execute the list of commands in all {} servers.",
            elapsed.as_secs_f64(),
            summaries.len()
        );
    }
}
