//! # remote-multicommand - Run shell commands on many hosts over SSH
//!
//! remote-multicommand fans a command out to a list of hosts with a bounded
//! number of concurrent SSH sessions and collects a per-host result for each
//! one. It can also run an ordered list of commands, dropping every host from
//! the rest of the list as soon as one of its commands fails.
//!
//! ## Core Concepts
//!
//! - **Transport**: opens a session to one host, runs one command, closes
//!   ([`connection::Transport`])
//! - **Dispatcher**: runs one command on a host list in batches of at most
//!   `max_concurrency` workers ([`executor::Dispatcher`])
//! - **Sequencer**: runs a command script, keeping only hosts whose previous
//!   command succeeded ([`executor::Sequencer`])
//! - **Reports**: per-host outcomes and histories ([`report`])
//! - **Callbacks**: injected observers for progress and logging ([`callback`])
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 CLI (clap) / caller                  │
//! └──────────────────────────────────────────────────────┘
//!                           │ script, hosts, RunOptions
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │      Sequencer (live set, drop on first failure)     │
//! └──────────────────────────────────────────────────────┘
//!                           │ one command, live hosts
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  Dispatcher (batches, one tokio task per host)       │──▶ RunCallback
//! └──────────────────────────────────────────────────────┘
//!                           │ connect / execute / close
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │          Transport (russh SSH, local sh -c)          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use remote_multicommand::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = SshSettings::default().user("admin").private_key("~/.ssh/id_ed25519");
//!     let transport = build_transport(TransportKind::Ssh, settings)?;
//!
//!     let mut sequencer = Sequencer::new(transport)
//!         .with_callback(Arc::new(LogCallback::new(LogLevel::Info)));
//!     let report = sequencer
//!         .run_sequence("apt-get update; apt-get -y upgrade", &["web01", "web02"], &RunOptions::new(10))
//!         .await?;
//!
//!     for summary in report.summaries() {
//!         println!("{}: {} issued, {} bypassed", summary.host, summary.issued, summary.bypassed);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use std::sync::Arc;

    // Transports
    pub use crate::connection::local::LocalTransport;
    #[cfg(feature = "russh")]
    pub use crate::connection::russh::SshTransport;
    pub use crate::connection::{
        build_transport, CommandResult, ConnectionError, LogLevel, SshSettings, Transport,
        TransportKind,
    };

    // Execution
    pub use crate::executor::{Dispatcher, RunOptions, Sequencer};
    pub use crate::script::CommandScript;

    // Results
    pub use crate::report::{CommandOutcome, DispatchReport, HostHistory, HostSummary, RunReport};

    // Callbacks
    pub use crate::callback::{
        LogCallback, NullCallback, ProgressCallback, RunCallback, SharedCallback,
    };

    // Errors
    pub use crate::error::{Error, InputError, Result};
}

/// Error types.
pub mod error;

/// Transport layer: the [`Transport`](connection::Transport) trait and its
/// SSH and local implementations.
pub mod connection;

/// Per-host outcomes, histories and run summaries.
pub mod report;

/// Command script parsing.
pub mod script;

/// Dispatcher and sequential runner.
pub mod executor;

/// Observability callbacks.
pub mod callback;

/// Layered configuration.
pub mod config;

pub use error::{Error, Result};

/// Returns the current version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
