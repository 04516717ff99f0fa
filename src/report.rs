//! Per-host results and their aggregation.
//!
//! A [`DispatchReport`] is what one command produced across a host list. A
//! [`RunReport`] accumulates dispatch reports into one ordered
//! [`HostHistory`] per host. Both keep hosts in input order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::connection::{CommandResult, ConnectionError};

/// The outcome of one command on one host.
///
/// | `access_granted` | `succeeded` | `output`                   |
/// |------------------|-------------|----------------------------|
/// | `false`          | `false`     | connection failure reason  |
/// | `true`           | `false`     | stderr (or transport error)|
/// | `true`           | `true`      | stdout                     |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// The command that was run
    pub command: String,
    /// Whether a session could be established
    pub access_granted: bool,
    /// Whether the command completed successfully
    pub succeeded: bool,
    /// stdout, stderr or the failure reason
    pub output: String,
}

impl CommandOutcome {
    /// The command ran and succeeded
    pub fn success(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            access_granted: true,
            succeeded: true,
            output: stdout.into(),
        }
    }

    /// The command ran and failed
    pub fn failure(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            access_granted: true,
            succeeded: false,
            output: stderr.into(),
        }
    }

    /// No session could be established
    pub fn unreachable(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            access_granted: false,
            succeeded: false,
            output: reason.into(),
        }
    }

    /// Build the outcome of a command that reached the host
    pub fn from_execution(command: &str, result: Result<CommandResult, ConnectionError>) -> Self {
        match result {
            Ok(r) if r.success => Self::success(command, r.stdout),
            Ok(r) => Self::failure(command, r.stderr),
            Err(e) => Self::failure(command, e.to_string()),
        }
    }
}

/// Ordered outcomes for one host, in command execution order.
///
/// Append-only: outcomes can be pushed but never removed or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostHistory(Vec<CommandOutcome>);

impl HostHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next outcome
    pub fn push(&mut self, outcome: CommandOutcome) {
        self.0.push(outcome);
    }

    /// Outcomes in execution order
    pub fn outcomes(&self) -> &[CommandOutcome] {
        &self.0
    }

    /// Number of commands issued to the host
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no command was issued
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent outcome
    pub fn last(&self) -> Option<&CommandOutcome> {
        self.0.last()
    }

    /// Whether every issued command succeeded
    pub fn all_succeeded(&self) -> bool {
        self.0.iter().all(|o| o.succeeded)
    }
}

/// Single-command results: host → outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchReport {
    outcomes: IndexMap<String, CommandOutcome>,
}

impl DispatchReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for `host`
    pub fn insert(&mut self, host: impl Into<String>, outcome: CommandOutcome) {
        self.outcomes.insert(host.into(), outcome);
    }

    /// Outcome for a host
    pub fn get(&self, host: &str) -> Option<&CommandOutcome> {
        self.outcomes.get(host)
    }

    /// Number of hosts in the report
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True if the report is empty
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterate over (host, outcome) in input order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommandOutcome)> {
        self.outcomes.iter().map(|(h, o)| (h.as_str(), o))
    }

    /// Hosts whose command did not succeed
    pub fn failed_hosts(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, o)| !o.succeeded).map(|(h, _)| h)
    }

    /// Whether every host succeeded
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(|o| o.succeeded)
    }
}

/// Per-host command histories of a sequential run.
///
/// Every host of the input list is present from the start, so hosts that were
/// dropped early simply have shorter histories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of commands in the script
    command_count: usize,
    histories: IndexMap<String, HostHistory>,
}

impl RunReport {
    /// Create a report with an empty history for every host
    pub fn new<S: AsRef<str>>(hosts: &[S], command_count: usize) -> Self {
        Self {
            command_count,
            histories: hosts
                .iter()
                .map(|h| (h.as_ref().to_string(), HostHistory::new()))
                .collect(),
        }
    }

    /// Append a batch of outcomes to the hosts' histories.
    ///
    /// Must be called once per command, after the whole dispatch completed.
    /// Hosts not declared at construction are ignored.
    pub fn record(&mut self, batch: &DispatchReport) {
        for (host, outcome) in batch.iter() {
            if let Some(history) = self.histories.get_mut(host) {
                history.push(outcome.clone());
            }
        }
    }

    /// History for a host
    pub fn get(&self, host: &str) -> Option<&HostHistory> {
        self.histories.get(host)
    }

    /// Number of commands in the script
    pub fn command_count(&self) -> usize {
        self.command_count
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// True if there are no hosts
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Iterate over (host, history) in input order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostHistory)> {
        self.histories.iter().map(|(h, o)| (h.as_str(), o))
    }

    /// Whether every host ran every command successfully
    pub fn all_succeeded(&self) -> bool {
        self.histories
            .values()
            .all(|h| h.len() == self.command_count && h.all_succeeded())
    }

    /// Issued/bypassed counts for every host
    pub fn summaries(&self) -> Vec<HostSummary> {
        self.iter()
            .map(|(host, history)| HostSummary {
                host: host.to_string(),
                issued: history.len(),
                bypassed: self.command_count - history.len(),
                failed: !history.all_succeeded(),
            })
            .collect()
    }
}

/// How far a host got through the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    /// Host name
    pub host: String,
    /// Commands issued to the host
    pub issued: usize,
    /// Commands skipped because the host was dropped
    pub bypassed: usize,
    /// Whether the host's last issued command failed
    pub failed: bool,
}

impl HostSummary {
    /// True if every command was issued
    pub fn all_issued(&self) -> bool {
        self.bypassed == 0
    }
}
