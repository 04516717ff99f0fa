//! Progress bar callback plugin.
//!
//! Shows one progress bar per dispatched command, advanced as hosts complete.
//! When stderr is not a terminal it falls back to plain `[PROGRESS]` lines.
//!
//! # Example Output (TTY)
//!
//! ```text
//! ⠋ [2/3] uptime ━━━━━━━━━━━━━━━━━━━━━━━━────────────── 4/8 hosts (00:00:02)
//! ```
//!
//! # Example Output (non-TTY/CI)
//!
//! ```text
//! [PROGRESS] Command 2/3: uptime (8 hosts, 2 batches)
//! [PROGRESS] web01 - ok
//! [PROGRESS] web02 - unreachable
//! ```

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use crate::callback::RunCallback;
use crate::report::{CommandOutcome, HostSummary};

/// Configuration for the progress callback
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to use colored output (overridden by NO_COLOR env var)
    pub use_color: bool,
    /// Template for the per-command progress bar
    pub bar_template: String,
    /// Spinner tick interval in milliseconds
    pub spinner_tick_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            bar_template: "{spinner:.green} {prefix:.bold.white} {bar:40.cyan/blue} {pos}/{len} hosts ({elapsed_precise})".to_string(),
            spinner_tick_ms: 80,
        }
    }
}

/// Progress bar callback for interactive runs.
#[derive(Debug)]
pub struct ProgressCallback {
    config: ProgressConfig,
    is_tty: AtomicBool,
    bar: Mutex<Option<ProgressBar>>,
    /// Commands in the current sequential run, zero for single dispatches
    command_count: AtomicUsize,
    /// Commands dispatched so far in the current sequential run
    command_index: AtomicUsize,
}

impl ProgressCallback {
    /// Create a new progress callback with default configuration.
    pub fn new() -> Self {
        Self::with_config(ProgressConfig::default())
    }

    /// Create a new progress callback with custom configuration.
    pub fn with_config(config: ProgressConfig) -> Self {
        let is_tty = std::io::stderr().is_terminal();
        let use_color = config.use_color && std::env::var("NO_COLOR").is_err();

        Self {
            config: ProgressConfig { use_color, ..config },
            is_tty: AtomicBool::new(is_tty),
            bar: Mutex::new(None),
            command_count: AtomicUsize::new(0),
            command_index: AtomicUsize::new(0),
        }
    }

    fn is_tty(&self) -> bool {
        self.is_tty.load(Ordering::Relaxed)
    }

    fn bar_style(&self) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&self.config.bar_template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━─")
    }

    fn prefix(&self, command: &str) -> String {
        let total = self.command_count.load(Ordering::SeqCst);
        if total == 0 {
            return command.to_string();
        }
        let index = self.command_index.load(Ordering::SeqCst);
        format!("[{}/{}] {}", index, total, command)
    }

    fn print_progress(&self, message: &str) {
        if self.config.use_color {
            eprintln!("{} {}", "[PROGRESS]".bright_blue().bold(), message);
        } else {
            eprintln!("[PROGRESS] {}", message);
        }
    }

    fn status_label(&self, outcome: &CommandOutcome) -> String {
        let (label, failed) = match (outcome.access_granted, outcome.succeeded) {
            (_, true) => ("ok", false),
            (true, false) => ("failed", true),
            (false, _) => ("unreachable", true),
        };
        match (self.config.use_color, failed) {
            (false, _) => label.to_string(),
            (true, false) => label.green().to_string(),
            (true, true) => label.red().bold().to_string(),
        }
    }
}

impl Default for ProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunCallback for ProgressCallback {
    async fn on_sequence_start(&self, command_count: usize, _host_count: usize) {
        self.command_count.store(command_count, Ordering::SeqCst);
        self.command_index.store(0, Ordering::SeqCst);
    }

    async fn on_dispatch_start(&self, command: &str, host_count: usize, batch_count: usize) {
        if self.command_count.load(Ordering::SeqCst) > 0 {
            self.command_index.fetch_add(1, Ordering::SeqCst);
        }
        let prefix = self.prefix(command);

        if !self.is_tty() {
            self.print_progress(&format!(
                "{} ({} hosts, {} batches)",
                prefix, host_count, batch_count
            ));
            return;
        }

        let bar = ProgressBar::new(host_count as u64);
        bar.set_style(self.bar_style());
        bar.set_prefix(prefix);
        bar.enable_steady_tick(Duration::from_millis(self.config.spinner_tick_ms));
        if let Some(previous) = self.bar.lock().replace(bar) {
            previous.finish_and_clear();
        }
    }

    async fn on_host_complete(&self, host: &str, outcome: &CommandOutcome) {
        if !self.is_tty() {
            self.print_progress(&format!("{} - {}", host, self.status_label(outcome)));
            return;
        }
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(1);
            if !outcome.succeeded {
                bar.println(format!("{} - {}", host, self.status_label(outcome)));
            }
        }
    }

    async fn on_dispatch_complete(&self, _command: &str, _host_count: usize, _elapsed: Duration) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_and_clear();
        }
    }

    async fn on_host_dropped(&self, host: &str, command: &str) {
        if !self.is_tty() {
            self.print_progress(&format!("{} dropped after '{}'", host, command));
        }
    }

    async fn on_sequence_complete(&self, summaries: &[HostSummary], elapsed: Duration) {
        let completed = summaries.iter().filter(|s| s.all_issued()).count();
        self.print_progress(&format!(
            "{}/{} hosts ran every command in {:.3}s",
            completed,
            summaries.len(),
            elapsed.as_secs_f64()
        ));
    }
}
