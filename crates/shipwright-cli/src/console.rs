//! Terminal side of the pipeline: progress lines, the watch spinner and the
//! merge confirmation prompt.

use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use shipwright_core::{Confirmer, FailureReport, PullRequest, Reporter, RunStatus, ShipwrightError};

/// Steady-tick spinner cleared when dropped.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner_style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// A spinner that draws nothing, for non-interactive output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn set_message(&self, message: String) {
        self.bar.set_message(message);
    }

    /// Run `f` with the spinner temporarily erased.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Prints pipeline lines to the terminal.
pub struct ConsoleReporter {
    spinner: Mutex<Option<Spinner>>,
    animate: bool,
}

impl ConsoleReporter {
    /// With `animate` false (no terminal, JSON logs) watches show no spinner.
    pub fn new(animate: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            animate,
        }
    }

    fn print(&self, line: String) {
        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(spinner) => spinner.suspend(|| println!("{line}")),
                None => println!("{line}"),
            },
            Err(_) => println!("{line}"),
        }
    }

    fn eprint(&self, line: String) {
        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(spinner) => spinner.suspend(|| eprintln!("{line}")),
                None => eprintln!("{line}"),
            },
            Err(_) => eprintln!("{line}"),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        self.print(format!("{} {}", style("→").cyan(), message));
    }

    fn success(&self, message: &str) {
        self.print(format!("{} {}", style("✓").green().bold(), message));
    }

    fn warn(&self, message: &str) {
        self.print(format!("{} {}", style("!").yellow().bold(), message));
    }

    fn failure(&self, report: &FailureReport) {
        let mut text = format!(
            "{} {} failed: run {} concluded '{}'\n",
            style("✗").red().bold(),
            report.action,
            report.run_id,
            report.conclusion
        );
        if report.log_tail.trim().is_empty() {
            text.push_str("(no log output)\n");
        } else {
            let heading = if report.truncated {
                format!(
                    "--- last {} characters of the log ---",
                    report.log_tail.chars().count()
                )
            } else {
                "--- log ---".to_string()
            };
            text.push_str(&format!(
                "{}\n{}\n",
                style(heading).dim(),
                report.log_tail.trim_end()
            ));
        }
        text.push_str(&format!("Full run: {}", report.url));
        self.eprint(text);
    }

    fn progress(&self, run_id: u64, status: &RunStatus) {
        if let Ok(guard) = self.spinner.lock() {
            if let Some(spinner) = guard.as_ref() {
                spinner.set_message(format!("Run {run_id}: {status}"));
            }
        }
    }

    fn watch_started(&self, run_id: u64, _url: &str) {
        let spinner = if self.animate {
            Spinner::start(&format!("Waiting for run {run_id}"))
        } else {
            Spinner::hidden()
        };
        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(spinner);
        }
    }

    fn watch_finished(&self, _run_id: u64) {
        let finished = self.spinner.lock().ok().and_then(|mut guard| guard.take());
        drop(finished);
    }
}

/// Asks on stdin before merging.
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, pr: &PullRequest) -> shipwright_core::Result<bool> {
        let prompt = format!(
            "Merge pull request #{} ({} -> {})? [y/N] ",
            pr.number, pr.head_ref_name, pr.base_ref_name
        );
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stdout = std::io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(ShipwrightError::backend)??;
        Ok(is_yes(&answer))
    }
}

/// `y`/`yes` in any case; everything else, including empty input, is no.
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
