//! Observability for dispatch and sequential runs.
//!
//! The [`Dispatcher`](crate::executor::Dispatcher) and the
//! [`Sequencer`](crate::executor::sequence::Sequencer) report progress through
//! an injected [`RunCallback`]. Callbacks observe only: nothing they do can
//! change which commands run or on which hosts.
//!
//! # Available Plugins
//!
//! - [`LogCallback`] - progress and failures through `tracing`, gated by a [`LogLevel`]
//! - [`ProgressCallback`] - `indicatif` progress bars for interactive use
//! - [`NullCallback`] - no output
//!
//! # Creating Custom Callbacks
//!
//! ```rust,ignore
//! use remote_multicommand::callback::RunCallback;
//! use remote_multicommand::report::CommandOutcome;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Debug, Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! #[async_trait::async_trait]
//! impl RunCallback for FailureCounter {
//!     async fn on_host_complete(&self, _host: &str, outcome: &CommandOutcome) {
//!         if !outcome.succeeded {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```
//!
//! [`LogLevel`]: crate::connection::LogLevel

pub mod plugins;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::report::{CommandOutcome, HostSummary};

pub use plugins::{LogCallback, NullCallback, ProgressCallback, ProgressConfig};

/// A shared callback wrapped in Arc for thread-safe shared ownership.
pub type SharedCallback = Arc<dyn RunCallback>;

/// Receives events from dispatch and sequential runs.
///
/// Every method has a no-op default so implementations only override the
/// events they care about.
#[async_trait]
pub trait RunCallback: Send + Sync {
    /// A command is about to be dispatched to `host_count` hosts in
    /// `batch_count` batches.
    async fn on_dispatch_start(&self, command: &str, host_count: usize, batch_count: usize) {
        let _ = (command, host_count, batch_count);
    }

    /// A batch is about to start. `index` is zero-based.
    async fn on_batch_start(&self, index: usize, hosts: &[String]) {
        let _ = (index, hosts);
    }

    /// A host finished its command.
    ///
    /// Called after the whole batch joined, once per host.
    async fn on_host_complete(&self, host: &str, outcome: &CommandOutcome) {
        let _ = (host, outcome);
    }

    /// Every host received the command.
    async fn on_dispatch_complete(&self, command: &str, host_count: usize, elapsed: Duration) {
        let _ = (command, host_count, elapsed);
    }

    /// A sequential run is starting.
    async fn on_sequence_start(&self, command_count: usize, host_count: usize) {
        let _ = (command_count, host_count);
    }

    /// `host` failed `command` and will receive no further commands.
    async fn on_host_dropped(&self, host: &str, command: &str) {
        let _ = (host, command);
    }

    /// A sequential run finished.
    async fn on_sequence_complete(&self, summaries: &[HostSummary], elapsed: Duration) {
        let _ = (summaries, elapsed);
    }
}
