//! Phase progress reporting on the terminal.
//!
//! One spinner line per phase with the phase label, optional model, and a
//! live elapsed counter; finished phases are rewritten as a ✓/✗ line with
//! the final time and a short annotation. All writes go to stderr so
//! captured agent and gate output never picks up UI bytes. Without an
//! attended terminal the spinner is suppressed and plain lines are emitted
//! instead.

use std::time::{Duration, Instant};

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::infrastructure::process::cleanup;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}]";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Terminal reporter for one run.
pub struct ProgressReporter {
    term: Term,
    attended: bool,
    active: Option<ActivePhase>,
    started: Instant,
}

struct ActivePhase {
    spinner: Option<ProgressBar>,
    label: String,
    since: Instant,
}

impl ProgressReporter {
    /// Reporter bound to stderr; silent-spinner mode when not a tty.
    pub fn new() -> Self {
        let term = Term::stderr();
        let attended = term.features().is_attended();
        Self {
            term,
            attended,
            active: None,
            started: Instant::now(),
        }
    }

    /// A section header, e.g. `Cycle 3 - 2 tasks remaining`.
    pub fn section(&self, title: &str) {
        self.write_line(&format!("{}", style(title).bold()));
    }

    /// A warning line that stays on screen.
    pub fn warn(&self, message: &str) {
        self.write_line(&format!("{} {message}", style("!").yellow().bold()));
    }

    /// An unstyled informational line.
    pub fn plain(&self, message: &str) {
        self.write_line(message);
    }

    /// Start a phase spinner. Phases are strictly nested: beginning a new
    /// phase while one is active finishes the old one without annotation.
    pub fn begin_phase(&mut self, label: &str, model: Option<&str>) {
        if self.active.is_some() {
            self.end_phase(true, "");
        }

        let display = match model {
            Some(model) => format!("{label} ({model})"),
            None => label.to_string(),
        };

        let spinner = if self.attended {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template(SPINNER_TEMPLATE)
                    .expect("valid spinner template")
                    .tick_chars(SPINNER_CHARS),
            );
            spinner.set_message(display.clone());
            spinner.enable_steady_tick(Duration::from_millis(80));
            cleanup::set_active_spinner(Some(spinner.clone()));
            Some(spinner)
        } else {
            self.write_line(&format!("▸ {display}"));
            None
        };

        self.active = Some(ActivePhase {
            spinner,
            label: display,
            since: Instant::now(),
        });
    }

    /// Finish the active phase with a ✓/✗ line.
    pub fn end_phase(&mut self, ok: bool, annotation: &str) {
        let Some(phase) = self.active.take() else {
            return;
        };
        if let Some(spinner) = phase.spinner {
            spinner.finish_and_clear();
        }
        cleanup::set_active_spinner(None);

        let mark = if ok {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        };
        let elapsed = format_elapsed(phase.since.elapsed());
        let line = if annotation.is_empty() {
            format!("{mark} {} ({elapsed})", phase.label)
        } else {
            format!("{mark} {} ({elapsed}) - {annotation}", phase.label)
        };
        self.write_line(&line);
    }

    /// Final summary with the run's total elapsed time.
    pub fn summary(&mut self, outcome: &str) {
        if self.active.is_some() {
            self.end_phase(true, "");
        }
        let total = format_elapsed(self.started.elapsed());
        self.write_line(&format!(
            "{} {outcome} (total {total})",
            style("■").bold()
        ));
    }

    fn write_line(&self, line: &str) {
        // Lines written while a spinner draws would collide with it;
        // suspend the bar around the write.
        if let Some(spinner) = self.active.as_ref().and_then(|p| p.spinner.as_ref()) {
            spinner.suspend(|| {
                let _ = self.term.write_line(line);
            });
            return;
        }
        // Term::write_line falls back to plain stderr when not a terminal.
        let _ = self.term.write_line(line);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a duration as `m:ss`.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
