//! Startup progress on stderr for `facelinkd`.
//!
//! Loading reference images and connecting to the drone can take seconds, so
//! each startup step gets a spinner on a terminal and a plain line otherwise.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct StartupUi {
    spinners: bool,
}

impl StartupUi {
    /// Spinners need a terminal on stderr; `Auto` also backs off when stdout
    /// is redirected, since that usually means a supervisor is capturing logs.
    pub fn new(mode: UiMode, stderr_is_tty: bool, stdout_is_tty: bool) -> Self {
        let spinners = stderr_is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => stdout_is_tty,
                UiMode::Plain => false,
            };
        Self { spinners }
    }

    pub fn step(&self, name: &str) -> Step {
        if !self.spinners {
            eprintln!("==> {}", name);
            return Step::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("{name}…"));
        Step::new(name, Some(spinner))
    }
}

/// One startup step. Dropped without [`Step::done`] means it failed.
pub struct Step {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    detail: Option<String>,
}

impl Step {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
            detail: None,
        }
    }

    pub fn done(mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }
}

impl Drop for Step {
    fn drop(&mut self) {
        let elapsed = format_elapsed(self.started.elapsed());
        let line = match &self.detail {
            Some(detail) if detail.is_empty() => format!("✔ {} ({})", self.name, elapsed),
            Some(detail) => format!("✔ {}: {} ({})", self.name, detail, elapsed),
            None => format!("✘ {} ({})", self.name, elapsed),
        };
        match &self.spinner {
            Some(spinner) if self.detail.is_some() => spinner.finish_with_message(line),
            Some(spinner) => spinner.abandon_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

fn format_elapsed(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
