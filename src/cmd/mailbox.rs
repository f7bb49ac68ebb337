//! Mailbox inbox-rule audit: flags rules that forward or redirect mail,
//! the usual persistence trick after an account compromise.

use crate::bulk::{report, BulkOperation, BulkRunner, OperationError, Payload};
use crate::cmd::{progress, RunFlags};
use crate::config::ConfigManager;
use crate::error::Result;
use crate::graph::{directory, GraphClient};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RulesAuditArgs {
    /// File with user principal names, one per line. Defaults to every user
    /// in the tenant
    #[arg(short, long)]
    pub users: Option<PathBuf>,

    /// Output file for the audit report
    #[arg(short, long, default_value = "mailbox-rules.csv")]
    pub output: PathBuf,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: String,

    #[command(flatten)]
    pub run: RunFlags,
}

/// Fetch one mailbox's inbox rules and distill them into audit columns.
struct RulesAudit<'a> {
    graph: &'a GraphClient,
}

impl BulkOperation for RulesAudit<'_> {
    fn describe(&self) -> &str {
        "auditing inbox rules"
    }

    async fn invoke(&self, identity: &str) -> std::result::Result<Payload, OperationError> {
        let rules = directory::list_inbox_rules(self.graph, identity).await?;

        let enabled = rules.iter().filter(|r| r.is_enabled == Some(true)).count();
        let forward_targets: Vec<String> =
            rules.iter().flat_map(|r| r.forward_targets()).collect();

        let mut payload = Payload::new();
        payload.insert("ruleCount".to_string(), rules.len().to_string());
        payload.insert("enabledRuleCount".to_string(), enabled.to_string());
        payload.insert(
            "forwardingRuleCount".to_string(),
            rules
                .iter()
                .filter(|r| !r.forward_targets().is_empty())
                .count()
                .to_string(),
        );
        if !forward_targets.is_empty() {
            payload.insert("forwardTargets".to_string(), forward_targets.join(";"));
        }
        Ok(payload)
    }
}

pub async fn rules(args: RulesAuditArgs) -> Result<()> {
    println!("{} mailbox inbox rules...", "Auditing".cyan().bold());

    let config = ConfigManager::load()?;
    let tenant = config.require_active_tenant()?;
    println!("→ Active tenant: {}", tenant.name.cyan().bold());

    let graph = GraphClient::from_config(&config, &tenant.name).await?;

    let identities = match &args.users {
        Some(path) => crate::cmd::read_identities(path)?,
        None => {
            let spinner = progress::create_spinner("Enumerating users...");
            let users = directory::list_users(&graph).await?;
            progress::finish_spinner_success(
                &spinner,
                &format!("{} users fetched", users.len()),
            );
            users
                .into_iter()
                .filter_map(|u| u.user_principal_name)
                .collect()
        }
    };

    let run_config = args.run.resolve(&config.load_config()?);
    let runner = BulkRunner::new(RulesAudit { graph: &graph }, run_config)
        .with_cancel(crate::cmd::cancel_on_ctrl_c());

    let bar = progress::create_progress_bar(identities.len() as u64, "Auditing mailboxes");
    let summary = runner
        .run_with_observer(&identities, |result| {
            if let Some(targets) = result.payload.get("forwardTargets") {
                bar.println(format!(
                    "  {} {} forwards to: {}",
                    "⚠".yellow().bold(),
                    result.identity,
                    targets
                ));
            }
            bar.inc(1);
        })
        .await?;
    bar.finish_and_clear();

    let flagged = summary
        .results
        .iter()
        .filter(|r| r.payload.contains_key("forwardTargets"))
        .count();

    report::export(&summary, &args.output, args.format.parse()?)?;
    report::print_summary(&summary, "Mailbox Rules Audit");
    if flagged > 0 {
        println!(
            "\n{} {} mailbox(es) have forwarding rules, review {}",
            "⚠".yellow().bold(),
            flagged,
            args.output.display()
        );
    } else {
        println!("\n{} No forwarding rules found", "✓".green().bold());
    }

    Ok(())
}
