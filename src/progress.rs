//! Terminal progress and confirmation for the executor

use crate::differ;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, ProgressCallback, ResourceDiff};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar per batch, diff display once the plan is known
pub struct ConsoleProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
    batch: String,
    failures: Vec<(String, String)>,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: None,
            batch: String::new(),
            failures: Vec::new(),
        }
    }

    /// Instances that failed, with their error
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    fn bar(&self, count: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_plan(&mut self, diffs: &[ResourceDiff]) {
        if !self.quiet {
            differ::display_diff(diffs);
        }
    }

    fn on_batch_start(&mut self, resource_type: &str, count: usize) {
        self.batch = resource_type.to_string();
        self.bar = Some(self.bar(count));
    }

    fn on_resource_start(&mut self, title: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {}", self.batch, title));
        }
    }

    fn on_resource_complete(&mut self, title: &str, result: &ApplyResult) {
        if let ApplyResult::Failed { error } = result {
            self.failures.push((title.to_string(), error.clone()));
        }
        match &self.bar {
            Some(bar) => {
                bar.set_message(format!("{} {}", ui::result_symbol(result), title));
                bar.inc(1);
            }
            // prefetch failures arrive outside any batch
            None if !self.quiet => println!("  {} {}", ui::result_symbol(result), title),
            None => {}
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            let done = bar.position() as usize;
            bar.finish_and_clear();
            if !self.quiet {
                println!(
                    "  {} {} {}",
                    "→".cyan(),
                    self.batch.bold(),
                    ui::plural(done, "resource").dimmed()
                );
            }
        }
    }
}

/// Asks on the terminal before applying
///
/// With `assume_yes` every prompt is accepted. Without a terminal to ask on,
/// every prompt is declined.
pub struct ConsoleConfirm {
    assume_yes: bool,
}

impl ConsoleConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmCallback for ConsoleConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        if !console::user_attended() {
            log::warn!("No terminal to confirm on; pass --yes to apply unattended");
            return Ok(false);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_collected() {
        let mut progress = ConsoleProgress::new(true);
        progress.on_batch_start("sensu_check", 2);
        progress.on_resource_start("cpu");
        progress.on_resource_complete("cpu", &ApplyResult::Created);
        progress.on_resource_start("memory");
        progress.on_resource_complete(
            "memory",
            &ApplyResult::Failed {
                error: "409 conflict".to_string(),
            },
        );
        progress.on_batch_complete();

        assert_eq!(
            progress.failures(),
            &[("memory".to_string(), "409 conflict".to_string())]
        );
    }

    #[test]
    fn test_assume_yes_never_prompts() {
        assert!(ConsoleConfirm::new(true).confirm("Apply 3 changes?").unwrap());
    }
}
