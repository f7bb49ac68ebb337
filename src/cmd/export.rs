//! Directory exports: users, groups, and the BitLocker recovery-key backup.

use crate::bulk::{report, BulkOperation, BulkRunner, OperationError, Payload};
use crate::cmd::{progress, RunFlags};
use crate::config::ConfigManager;
use crate::error::Result;
use crate::graph::{directory, GraphClient};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportUsersArgs {
    /// Output file
    #[arg(short, long, default_value = "users.csv")]
    pub output: PathBuf,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ExportGroupsArgs {
    /// Output file
    #[arg(short, long, default_value = "groups.csv")]
    pub output: PathBuf,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct BitlockerBackupArgs {
    /// Output file for the key backup
    #[arg(short, long, default_value = "bitlocker-keys.csv")]
    pub output: PathBuf,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: String,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    #[command(flatten)]
    pub run: RunFlags,
}

#[derive(Serialize)]
struct UserRow {
    id: String,
    user_principal_name: String,
    display_name: String,
    mail: String,
    account_enabled: Option<bool>,
    user_type: String,
}

#[derive(Serialize)]
struct GroupRow {
    id: String,
    display_name: String,
    mail: String,
    security_enabled: Option<bool>,
    group_types: String,
}

pub async fn users(args: ExportUsersArgs) -> Result<()> {
    let config = ConfigManager::load()?;
    let tenant = config.require_active_tenant()?;
    let graph = GraphClient::from_config(&config, &tenant.name).await?;

    let spinner = progress::create_spinner("Enumerating users...");
    let users = match directory::list_users(&graph).await {
        Ok(users) => users,
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Failed to enumerate users");
            return Err(e);
        }
    };
    progress::finish_spinner_success(&spinner, &format!("{} users fetched", users.len()));

    match args.format.parse()? {
        report::ReportFormat::Json => {
            std::fs::write(&args.output, serde_json::to_string_pretty(&users)?)?;
        }
        report::ReportFormat::Csv => {
            let mut writer = csv::Writer::from_path(&args.output)?;
            for user in &users {
                writer.serialize(UserRow {
                    id: user.id.clone(),
                    user_principal_name: user.user_principal_name.clone().unwrap_or_default(),
                    display_name: user.display_name.clone().unwrap_or_default(),
                    mail: user.mail.clone().unwrap_or_default(),
                    account_enabled: user.account_enabled,
                    user_type: user.user_type.clone().unwrap_or_default(),
                })?;
            }
            writer.flush()?;
        }
    }

    println!(
        "{} Exported {} users to {}",
        "✓".green().bold(),
        users.len(),
        args.output.display()
    );

    Ok(())
}

pub async fn groups(args: ExportGroupsArgs) -> Result<()> {
    let config = ConfigManager::load()?;
    let tenant = config.require_active_tenant()?;
    let graph = GraphClient::from_config(&config, &tenant.name).await?;

    let spinner = progress::create_spinner("Enumerating groups...");
    let groups = match directory::list_groups(&graph).await {
        Ok(groups) => groups,
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Failed to enumerate groups");
            return Err(e);
        }
    };
    progress::finish_spinner_success(&spinner, &format!("{} groups fetched", groups.len()));

    match args.format.parse()? {
        report::ReportFormat::Json => {
            std::fs::write(&args.output, serde_json::to_string_pretty(&groups)?)?;
        }
        report::ReportFormat::Csv => {
            let mut writer = csv::Writer::from_path(&args.output)?;
            for group in &groups {
                writer.serialize(GroupRow {
                    id: group.id.clone(),
                    display_name: group.display_name.clone().unwrap_or_default(),
                    mail: group.mail.clone().unwrap_or_default(),
                    security_enabled: group.security_enabled,
                    group_types: group.group_types.join(";"),
                })?;
            }
            writer.flush()?;
        }
    }

    println!(
        "{} Exported {} groups to {}",
        "✓".green().bold(),
        groups.len(),
        args.output.display()
    );

    Ok(())
}

/// One recovery-key read per key id.
struct RecoveryKeyFetch<'a> {
    graph: &'a GraphClient,
}

impl BulkOperation for RecoveryKeyFetch<'_> {
    fn describe(&self) -> &str {
        "fetching recovery key"
    }

    async fn invoke(&self, identity: &str) -> std::result::Result<Payload, OperationError> {
        let key = directory::get_bitlocker_key(self.graph, identity).await?;

        let mut payload = Payload::new();
        if let Some(material) = key.key {
            payload.insert("recoveryKey".to_string(), material);
        }
        if let Some(device_id) = key.device_id {
            payload.insert("deviceId".to_string(), device_id);
        }
        if let Some(created) = key.created_date_time {
            payload.insert("createdDateTime".to_string(), created);
        }
        Ok(payload)
    }
}

pub async fn bitlocker(args: BitlockerBackupArgs) -> Result<()> {
    println!(
        "{} BitLocker recovery keys...",
        "Backing up".cyan().bold()
    );

    let config = ConfigManager::load()?;
    let tenant = config.require_active_tenant()?;
    println!("→ Active tenant: {}", tenant.name.cyan().bold());

    let graph = GraphClient::from_config(&config, &tenant.name).await?;

    let spinner = progress::create_spinner("Enumerating recovery keys...");
    let key_infos = directory::list_bitlocker_keys(&graph).await?;
    progress::finish_spinner_success(&spinner, &format!("{} keys found", key_infos.len()));

    if key_infos.is_empty() {
        println!("{} No recovery keys in this tenant", "ℹ".blue());
        return Ok(());
    }

    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Export {} recovery keys (key material included) to {}?",
                key_infos.len(),
                args.output.display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let identities: Vec<String> = key_infos.into_iter().map(|k| k.id).collect();
    let run_config = args.run.resolve(&config.load_config()?);
    let runner = BulkRunner::new(RecoveryKeyFetch { graph: &graph }, run_config)
        .with_cancel(crate::cmd::cancel_on_ctrl_c());

    let bar = progress::create_progress_bar(identities.len() as u64, "Fetching keys");
    let summary = runner
        .run_with_observer(&identities, |_| bar.inc(1))
        .await?;
    bar.finish_and_clear();

    report::export(&summary, &args.output, args.format.parse()?)?;
    report::print_summary(&summary, "BitLocker Backup");
    println!(
        "\n{} Backup written to {}",
        "✓".green().bold(),
        args.output.display()
    );

    Ok(())
}
