//! Script command - Execute a list of commands in order
//!
//! A host that fails a command receives none of the following ones.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use remote_multicommand::executor::Sequencer;
use remote_multicommand::script::CommandScript;
use std::path::PathBuf;
use tracing::debug;

/// Arguments for the script command
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["script", "file"])))]
pub struct ScriptArgs {
    /// Commands separated by `;` or newlines; lines starting with `#` are ignored
    pub script: Option<String>,

    /// Read the commands from a file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl ScriptArgs {
    fn load(&self) -> Result<CommandScript> {
        match (&self.script, &self.file) {
            (Some(text), _) => Ok(CommandScript::from(text.as_str())),
            (None, Some(path)) => CommandScript::from_file(path)
                .with_context(|| format!("Failed to load script: {}", path.display())),
            (None, None) => anyhow::bail!("No script given"),
        }
    }

    /// Execute the script command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let script = self.load()?;
        let options = ctx.run_options();
        debug!(
            hosts = ctx.hosts.len(),
            forks = options.max_concurrency,
            "Running command script"
        );

        let mut sequencer = Sequencer::new(ctx.transport()?).with_callback(ctx.callback());
        let report = sequencer.run_sequence(script, &ctx.hosts, &options).await?;

        if report.command_count() == 0 {
            ctx.output.warning("Script contains no commands");
        }
        ctx.output.run_report(&report)?;
        Ok(CommandContext::exit_code(report.all_succeeded()))
    }
}
