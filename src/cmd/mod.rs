pub mod archive;
pub mod export;
pub mod login;
pub mod mailbox;
pub mod onedrive;
pub mod progress;
pub mod readiness;
pub mod tenant;

use crate::bulk::{CancelFlag, RunConfig};
use crate::config::Config;
use crate::error::{Ops365Error, Result};
use clap::Args;
use std::path::Path;
use std::time::Duration;

/// Bulk-run knobs shared by every per-identity command. Unset flags fall
/// back to the values in `config.toml`.
#[derive(Args, Debug, Clone, Copy)]
pub struct RunFlags {
    /// Additional attempts per identity after the first
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between attempts for the same identity
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Seconds to wait between consecutive identities
    #[arg(long)]
    pub pacing: Option<u64>,
}

impl RunFlags {
    pub fn resolve(&self, config: &Config) -> RunConfig {
        let defaults = config.run_defaults;
        RunConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: Duration::from_secs(
                self.retry_delay.unwrap_or(defaults.retry_delay_secs),
            ),
            pacing: Duration::from_secs(self.pacing.unwrap_or(defaults.pacing_secs)),
        }
    }
}

/// Read identities from a text file: one per line, blanks and `#` comments
/// skipped.
pub fn read_identities(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    let identities: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if identities.is_empty() {
        return Err(Ops365Error::InvalidArgument(format!(
            "{} contains no identities",
            path.display()
        )));
    }

    Ok(identities)
}

/// Cancellation flag that flips on Ctrl-C. Identities not yet started are
/// recorded as skipped and the partial summary is still exported.
pub fn cancel_on_ctrl_c() -> CancelFlag {
    let flag = CancelFlag::new();
    let handler_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, finishing current item...");
            handler_flag.cancel();
        }
    });
    flag
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn run_flags_override_config_defaults() {
        let config = Config::default();
        let flags = RunFlags {
            max_retries: Some(5),
            retry_delay: None,
            pacing: Some(0),
        };

        let run_config = flags.resolve(&config);
        assert_eq!(run_config.max_retries, 5);
        assert_eq!(run_config.retry_delay, Duration::from_secs(2));
        assert_eq!(run_config.pacing, Duration::ZERO);
    }

    #[test]
    fn identity_files_skip_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# pilot wave\na@x.com\n\n  b@x.com  \n").unwrap();

        let identities = read_identities(file.path()).unwrap();
        assert_eq!(identities, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn empty_identity_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();

        let err = read_identities(file.path()).unwrap_err();
        assert!(matches!(err, Ops365Error::InvalidArgument(_)));
    }
}
