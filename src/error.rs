//! Error types for remote-multicommand.
//!
//! Per-host transport and command failures never surface here: they are
//! recorded in the host's [`CommandOutcome`](crate::report::CommandOutcome).
//! This module covers the conditions that abort a run before any dispatch
//! happens, plus configuration and I/O failures at the edges.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for remote-multicommand operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller's input cannot be run at all.
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] InputError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a run is rejected before the first transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// No hosts were given.
    #[error("host list is empty")]
    EmptyHostList,

    /// A host appears more than once in the host list.
    #[error("host '{0}' appears more than once in the host list")]
    DuplicateHost(String),

    /// A non-empty script contained only separators, blank entries or comments.
    #[error("command script contains no usable commands")]
    NoUsableCommands,

    /// Parallelism must allow at least one worker.
    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,
}

impl Error {
    /// Creates a new invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if the run was rejected because of its input.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::MalformedInput(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedInput(_) => 4,
            Error::Config(_) | Error::InvalidConfig { .. } => 5,
            _ => 1,
        }
    }
}
