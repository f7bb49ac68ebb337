//! OneDrive provisioning for a list of users.
//!
//! Requesting a user's default drive triggers provisioning for licensed
//! users whose drive does not exist yet; the request fails until SharePoint
//! finishes, so each user runs through the bounded-retry wrapper.

use crate::bulk::{report, BulkOperation, BulkRunner, OperationError, Payload};
use crate::cmd::{progress, RunFlags};
use crate::config::ConfigManager;
use crate::error::{FailureKind, Result};
use crate::graph::{directory, GraphClient};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// File with user principal names, one per line
    #[arg(short, long)]
    pub users: PathBuf,

    /// Output file for the provisioning report
    #[arg(short, long, default_value = "onedrive-provisioning.csv")]
    pub output: PathBuf,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: String,

    /// Retry every provisioning failure, not just transient ones. Unknown
    /// users are still reported immediately without retry
    #[arg(long)]
    pub retry_all: bool,

    #[command(flatten)]
    pub run: RunFlags,
}

/// Drive fetch per user. With `retry_all`, permanent provisioning failures
/// are remapped to transient so the wrapper keeps trying; a missing user
/// stays `NotFound` and is never retried.
struct DriveProvision<'a> {
    graph: &'a GraphClient,
    retry_all: bool,
}

impl BulkOperation for DriveProvision<'_> {
    fn describe(&self) -> &str {
        "provisioning drive"
    }

    async fn invoke(&self, identity: &str) -> std::result::Result<Payload, OperationError> {
        let drive = match directory::get_user_drive(self.graph, identity).await {
            Ok(drive) => drive,
            Err(e) => {
                let mut err = OperationError::from(e);
                if self.retry_all && err.kind == FailureKind::Permanent {
                    err.kind = FailureKind::Transient;
                }
                return Err(err);
            }
        };

        let mut payload = Payload::new();
        payload.insert("driveId".to_string(), drive.id);
        if let Some(web_url) = drive.web_url {
            payload.insert("webUrl".to_string(), web_url);
        }
        if let Some(quota) = drive.quota {
            if let Some(total) = quota.total {
                payload.insert("quotaTotal".to_string(), total.to_string());
            }
        }
        Ok(payload)
    }
}

pub async fn provision(args: ProvisionArgs) -> Result<()> {
    println!("{} OneDrive for users...", "Provisioning".cyan().bold());

    let config = ConfigManager::load()?;
    let tenant = config.require_active_tenant()?;
    println!("→ Active tenant: {}", tenant.name.cyan().bold());

    let identities = crate::cmd::read_identities(&args.users)?;
    println!(
        "→ {} user(s) from {}",
        identities.len(),
        args.users.display()
    );
    if args.retry_all {
        println!("→ retry-all: any provisioning failure will be retried");
    }

    let graph = GraphClient::from_config(&config, &tenant.name).await?;

    let run_config = args.run.resolve(&config.load_config()?);
    let op = DriveProvision {
        graph: &graph,
        retry_all: args.retry_all,
    };
    let runner =
        BulkRunner::new(op, run_config).with_cancel(crate::cmd::cancel_on_ctrl_c());

    let bar = progress::create_progress_bar(identities.len() as u64, "Provisioning");
    let summary = runner
        .run_with_observer(&identities, |result| {
            if result.failure_kind == Some(FailureKind::NotFound) {
                bar.println(format!(
                    "  {} {}: user not found",
                    "⚠".yellow().bold(),
                    result.identity
                ));
            }
            bar.inc(1);
        })
        .await?;
    bar.finish_and_clear();

    report::export(&summary, &args.output, args.format.parse()?)?;
    report::print_summary(&summary, "OneDrive Provisioning");
    println!(
        "\n{} Report written to {}",
        "✓".green().bold(),
        args.output.display()
    );

    Ok(())
}
