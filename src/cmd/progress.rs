//! Progress indicators shared by the commands.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for indeterminate work (enumeration, single calls).
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Bar for per-identity bulk runs.
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar
}

pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix("✓");
    spinner.finish_with_message(message.to_string());
}

pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.red} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix("✗");
    spinner.finish_with_message(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_lifecycle() {
        let spinner = create_spinner("Working...");
        assert!(!spinner.is_finished());
        finish_spinner_success(&spinner, "Done");
        assert!(spinner.is_finished());
    }

    #[test]
    fn bar_tracks_position() {
        let bar = create_progress_bar(10, "Processing");
        assert_eq!(bar.length(), Some(10));
        bar.inc(4);
        assert_eq!(bar.position(), 4);
        bar.finish();
    }
}
