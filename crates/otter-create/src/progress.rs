//! Console reporting for project creation

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

/// User-facing progress output
pub struct Progress {
    spinner: Option<ProgressBar>,
    start_time: Instant,
    silent: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            spinner: None,
            start_time: Instant::now(),
            silent: false,
        }
    }

    /// Create a silent reporter (no output)
    pub fn silent() -> Self {
        Self {
            spinner: None,
            start_time: Instant::now(),
            silent: true,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn creating(&self, app_name: &str, root: &Path) {
        if self.silent {
            return;
        }
        println!();
        println!(
            "Creating a new Otter app {} in {}.",
            style(app_name).green(),
            style(root.display()).green()
        );
        println!();
    }

    pub fn installing(&self, references: &[String]) {
        if self.silent {
            return;
        }
        println!("Installing packages. This might take a couple of minutes.");
        println!("Installing {}...", style(references.join(", ")).cyan());
        println!();
    }

    /// Spinner shown while a remote tarball is fetched and inspected
    pub fn start_fetch(&mut self, what: &str) {
        if self.silent {
            return;
        }

        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style);
        bar.set_prefix(format!("{}", style("Fetching").cyan().bold()));
        bar.set_message(what.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        self.spinner = Some(bar);
    }

    pub fn finish_fetch(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }

    /// Print the list of files blocking project creation
    pub fn conflicts(&self, app_name: &str, conflicts: &[String]) {
        if self.silent {
            return;
        }
        println!(
            "The directory {} contains files that could conflict:",
            style(app_name).green()
        );
        println!();
        for file in conflicts {
            println!("  {}", file);
        }
        println!();
        println!("Either try using a new directory name, or remove the files listed above.");
    }

    pub fn rollback_start(&self, reason: &str) {
        if self.silent {
            return;
        }
        println!();
        println!("Aborting installation.");
        eprintln!("  {}", style(reason).cyan());
        println!();
    }

    pub fn deleting(&self, what: &str, from: &Path) {
        if self.silent {
            return;
        }
        println!(
            "Deleting {} from {}",
            style(what).cyan(),
            style(from.display()).cyan()
        );
    }

    pub fn rollback_done(&self) {
        if self.silent {
            return;
        }
        println!("Done.");
    }

    pub fn success(&self, app_name: &str, root: &Path) {
        if self.silent {
            return;
        }
        let secs = self.start_time.elapsed().as_secs_f64();
        println!();
        println!(
            "{} Created {} at {} in {:.1}s",
            style("✨").bold(),
            style(app_name).green(),
            root.display(),
            secs
        );
    }

    /// Print error message
    pub fn error(&self, msg: &str) {
        if self.silent {
            return;
        }
        eprintln!("{} {}", style("✗").red().bold(), msg);
    }

    /// Print warning message
    pub fn warn(&self, msg: &str) {
        if self.silent {
            return;
        }
        eprintln!("{} {}", style("⚠").yellow().bold(), msg);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
