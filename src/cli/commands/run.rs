//! Run command - Execute one command on every host

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use remote_multicommand::executor::Dispatcher;
use tracing::debug;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Shell command to execute
    #[arg(required = true)]
    pub command: String,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let options = ctx.run_options();
        debug!(
            hosts = ctx.hosts.len(),
            forks = options.max_concurrency,
            "Running single command"
        );

        let mut dispatcher = Dispatcher::new(ctx.transport()?).with_callback(ctx.callback());
        let report = dispatcher
            .dispatch(&self.command, &ctx.hosts, &options)
            .await?;

        ctx.output.dispatch_report(&self.command, &report)?;
        Ok(CommandContext::exit_code(report.all_succeeded()))
    }
}
