//! Sequential multi-command runs.
//!
//! Each command of a script is dispatched to the hosts that are still live.
//! A host whose command fails is dropped and receives nothing further, so its
//! history stops at the failing command.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{validate_hosts, Dispatcher, RunOptions};
use crate::callback::SharedCallback;
use crate::connection::Transport;
use crate::error::Result;
use crate::report::RunReport;
use crate::script::CommandScript;

/// Drives a [`Dispatcher`] through an ordered list of commands.
#[derive(Debug)]
pub struct Sequencer {
    dispatcher: Dispatcher,
}

impl Sequencer {
    /// Create a sequencer around a prototype transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::from_dispatcher(Dispatcher::new(transport))
    }

    /// Create a sequencer reusing an existing dispatcher
    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Set the callback receiving progress events
    pub fn with_callback(mut self, callback: SharedCallback) -> Self {
        self.dispatcher.set_callback(callback);
        self
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run every command of `script` in order on `hosts`.
    ///
    /// The returned report holds every input host. A host that failed a
    /// command has a history ending with that failure; a host that never
    /// failed has one outcome per command. An empty script yields empty
    /// histories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`](crate::Error::MalformedInput) when the
    /// host list is empty or duplicated, the concurrency is zero, or the
    /// script cannot be parsed. Nothing is dispatched in that case.
    pub async fn run_sequence<S: AsRef<str>>(
        &mut self,
        script: impl Into<CommandScript>,
        hosts: &[S],
        options: &RunOptions,
    ) -> Result<RunReport> {
        options.validate()?;
        validate_hosts(hosts)?;
        let commands = script.into().parse()?;
        let hosts: Vec<String> = hosts.iter().map(|h| h.as_ref().to_string()).collect();

        let callback = Arc::clone(self.dispatcher.callback());
        let start = Instant::now();
        let mut report = RunReport::new(&hosts, commands.len());
        let mut live = hosts;

        callback
            .on_sequence_start(commands.len(), report.len())
            .await;

        for (index, command) in commands.iter().enumerate() {
            if live.is_empty() {
                debug!(
                    remaining = commands.len() - index,
                    "No live hosts left, skipping remaining commands"
                );
                break;
            }

            let batch = self
                .dispatcher
                .dispatch_validated(command, &live, options)
                .await;
            report.record(&batch);

            for host in batch.failed_hosts() {
                callback.on_host_dropped(host, command).await;
            }
            live.retain(|host| batch.get(host).is_some_and(|o| o.succeeded));
        }

        callback
            .on_sequence_complete(&report.summaries(), start.elapsed())
            .await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::local::LocalTransport;
    use crate::error::{Error, InputError};

    fn local() -> Sequencer {
        Sequencer::new(Box::new(LocalTransport::new(None)))
    }

    #[tokio::test]
    async fn test_failing_command_stops_the_sequence() {
        let mut sequencer = local();
        let report = sequencer
            .run_sequence("echo one; false; echo three", &["a", "b"], &RunOptions::new(2))
            .await
            .unwrap();

        for (_, history) in report.iter() {
            assert_eq!(history.len(), 2);
            assert!(!history.last().unwrap().succeeded);
        }
        assert_eq!(report.summaries()[0].bypassed, 1);
    }

    #[tokio::test]
    async fn test_empty_script_keeps_every_host() {
        let mut sequencer = local();
        let report = sequencer
            .run_sequence("", &["a", "b"], &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, h)| h.is_empty()));
        assert_eq!(sequencer.dispatcher().worker_count(), 0);
    }

    #[tokio::test]
    async fn test_unusable_script_is_rejected() {
        let mut sequencer = local();
        let err = sequencer
            .run_sequence("# only a comment", &["a"], &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedInput(InputError::NoUsableCommands)
        ));
    }
}
