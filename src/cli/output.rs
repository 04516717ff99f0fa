//! Output formatting module for remote-multicommand
//!
//! Renders dispatch and run reports as colored text or JSON on stdout.
//! Diagnostics go to stderr.

use anyhow::Result;
use colored::{Color, Colorize};
use remote_multicommand::config::ColorsConfig;
use remote_multicommand::report::{CommandOutcome, DispatchReport, RunReport};
use std::time::{Duration, Instant};

/// Status of one command on one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Command succeeded
    Ok,
    /// Command ran and failed
    Failed,
    /// No session could be established
    Unreachable,
}

impl OutcomeStatus {
    /// Classify an outcome
    pub fn of(outcome: &CommandOutcome) -> Self {
        match (outcome.access_granted, outcome.succeeded) {
            (false, _) => OutcomeStatus::Unreachable,
            (true, true) => OutcomeStatus::Ok,
            (true, false) => OutcomeStatus::Failed,
        }
    }

    /// Get the plain string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Unreachable => "unreachable",
        }
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Status colors
    colors: ColorsConfig,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, colors: ColorsConfig) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && colors.enabled && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            colors,
            start_time: Instant::now(),
        }
    }

    fn color(name: &str, fallback: Color) -> Color {
        name.parse().unwrap_or(fallback)
    }

    fn status_string(&self, status: OutcomeStatus) -> String {
        if !self.use_color {
            return status.as_str().to_string();
        }
        let color = match status {
            OutcomeStatus::Ok => Self::color(&self.colors.ok, Color::Green),
            OutcomeStatus::Failed => Self::color(&self.colors.failed, Color::Red),
            OutcomeStatus::Unreachable => Self::color(&self.colors.unreachable, Color::BrightRed),
        };
        let text = status.as_str().color(color);
        match status {
            OutcomeStatus::Ok => text.to_string(),
            _ => text.bold().to_string(),
        }
    }

    fn host_string(&self, host: &str) -> String {
        if self.use_color {
            host.color(Self::color(&self.colors.highlight, Color::White))
                .bold()
                .to_string()
        } else {
            host.to_string()
        }
    }

    /// Print a header line padded with stars
    fn header(&self, title: &str) {
        let stars = "*".repeat(80_usize.saturating_sub(title.len() + 1));
        if self.use_color {
            println!("\n{} {}", title.bright_white().bold(), stars.bright_black());
        } else {
            println!("\n{} {}", title, stars);
        }
    }

    /// Print one outcome line, with its output indented below it
    fn outcome(&self, host: &str, outcome: &CommandOutcome) {
        println!(
            "{}: [{}]",
            self.status_string(OutcomeStatus::of(outcome)),
            self.host_string(host)
        );
        for line in outcome.output.lines() {
            println!("    {}", line);
        }
    }

    /// Print the result of a single-command dispatch
    pub fn dispatch_report(&self, command: &str, report: &DispatchReport) -> Result<()> {
        if self.json_mode {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        self.header(&format!("COMMAND [{}]", command));
        for (host, outcome) in report.iter() {
            self.outcome(host, outcome);
        }
        self.footer(report.all_succeeded());
        Ok(())
    }

    /// Print the histories and summary of a sequential run
    pub fn run_report(&self, report: &RunReport) -> Result<()> {
        if self.json_mode {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        for (host, history) in report.iter() {
            self.header(&format!("HOST [{}]", host));
            for outcome in history.outcomes() {
                if self.use_color {
                    println!("{} {}", "$".bright_black(), outcome.command.bold());
                } else {
                    println!("$ {}", outcome.command);
                }
                self.outcome(host, outcome);
            }
        }

        self.header("RECAP");
        for summary in report.summaries() {
            let line = format!(
                "issued={:<4} bypassed={:<4} all_issued={}",
                summary.issued,
                summary.bypassed,
                if summary.all_issued() { "yes" } else { "no" }
            );
            if self.use_color {
                let host = if summary.failed {
                    summary.host.red().bold()
                } else {
                    summary.host.green()
                };
                println!("{:<30} : {}", host, line);
            } else {
                println!("{:<30} : {}", summary.host, line);
            }
        }
        self.footer(report.all_succeeded());
        Ok(())
    }

    fn footer(&self, success: bool) {
        let took = format!("Run took {}", format_duration(self.start_time.elapsed()));
        if self.use_color {
            println!("\n{}", took.bright_black());
            if success {
                println!("{}", "All hosts succeeded.".green().bold());
            } else {
                println!("{}", "Some hosts failed.".red().bold());
            }
        } else {
            println!("\n{}", took);
            println!(
                "{}",
                if success {
                    "All hosts succeeded."
                } else {
                    "Some hosts failed."
                }
            );
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }
}

/// Format a duration in human-readable form
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status() {
        assert_eq!(
            OutcomeStatus::of(&CommandOutcome::success("ls", "")),
            OutcomeStatus::Ok
        );
        assert_eq!(
            OutcomeStatus::of(&CommandOutcome::failure("ls", "")),
            OutcomeStatus::Failed
        );
        assert_eq!(
            OutcomeStatus::of(&CommandOutcome::unreachable("ls", "")),
            OutcomeStatus::Unreachable
        );
    }

    #[test]
    fn test_plain_status_strings() {
        let output = OutputFormatter::new(false, false, ColorsConfig::default());
        assert_eq!(output.status_string(OutcomeStatus::Failed), "failed");
        assert_eq!(output.host_string("web01"), "web01");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
