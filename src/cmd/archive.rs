//! Archive a local directory to Azure blob storage via the azcopy CLI.

use crate::config::ConfigManager;
use crate::error::{Ops365Error, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tokio::process::Command;
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Local directory to archive
    #[arg(short, long)]
    pub source: PathBuf,

    /// Destination container URL (including SAS token)
    #[arg(short, long)]
    pub destination: String,

    /// Show the plan without copying
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ArchiveCheckArgs {}

struct ArchivePlan {
    files: usize,
    bytes: u64,
}

/// Walk the source tree and tally what a copy would move.
fn build_plan(source: &PathBuf) -> Result<ArchivePlan> {
    let mut files = 0usize;
    let mut bytes = 0u64;

    for entry in WalkDir::new(source) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files += 1;
            bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }

    Ok(ArchivePlan { files, bytes })
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub async fn run(args: ArchiveArgs) -> Result<()> {
    println!("{} files to blob storage...", "Archiving".cyan().bold());

    // The active tenant is informational here; azcopy authenticates with the
    // SAS token in the destination URL.
    let config = ConfigManager::load()?;
    if let Some(tenant) = config.get_active_tenant()? {
        println!("→ Active tenant: {}", tenant.name.cyan().bold());
    }

    if !args.source.is_dir() {
        return Err(Ops365Error::InvalidArgument(format!(
            "{} is not a directory",
            args.source.display()
        )));
    }

    let plan = build_plan(&args.source)?;
    println!(
        "→ {} file(s), {} from {}",
        plan.files,
        human_bytes(plan.bytes),
        args.source.display()
    );

    if plan.files == 0 {
        println!("{} Nothing to archive", "ℹ".blue());
        return Ok(());
    }

    if args.dry_run {
        println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        return Ok(());
    }

    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Copy {} file(s) ({}) to the destination container?",
                plan.files,
                human_bytes(plan.bytes)
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let output = Command::new("azcopy")
        .arg("copy")
        .arg(&args.source)
        .arg(&args.destination)
        .arg("--recursive")
        .output()
        .await
        .map_err(|e| {
            Ops365Error::AzCopyError(format!(
                "could not launch azcopy ({}). Is it installed and on PATH?",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Ops365Error::AzCopyError(format!(
            "exit {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    println!(
        "{} Archived {} file(s) to blob storage",
        "✓".green().bold(),
        plan.files
    );

    Ok(())
}

/// Verify azcopy is installed and report its version.
pub async fn check(_args: ArchiveCheckArgs) -> Result<()> {
    println!("{} azcopy installation...", "Checking".cyan().bold());

    match Command::new("azcopy").arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            println!("  {} {}", "✓".green(), version.trim());
        }
        Ok(_) | Err(_) => {
            println!("  {} azcopy not found on PATH", "✗".red());
            println!("  Install: https://aka.ms/downloadazcopy");
        }
    }

    Ok(())
}
