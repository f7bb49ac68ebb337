// Allow dead code for Graph verbs kept as part of the client API
#![allow(dead_code)]

mod bulk;
mod cmd;
mod config;
mod error;
mod graph;
mod readiness;

use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser, Debug)]
#[command(
    name = "ops365",
    about = "Bulk Microsoft 365 administration from the command line",
    version,
    long_about = "Bulk Microsoft 365 administration CLI\n\n\
                  Run per-user Graph operations across whole tenants with bounded\n\
                  retry, pacing, and CSV/JSON run reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate to Microsoft Graph API
    Login(cmd::login::LoginArgs),

    /// Logout and clear cached credentials
    Logout(cmd::login::LogoutArgs),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Export directory data and BitLocker keys
    #[command(subcommand)]
    Export(ExportCommands),

    /// Audit mailbox configuration
    #[command(subcommand)]
    Mailbox(MailboxCommands),

    /// OneDrive provisioning
    #[command(subcommand)]
    Onedrive(OnedriveCommands),

    /// Archive local data to Azure Blob Storage
    #[command(subcommand)]
    Archive(ArchiveCommands),

    /// Migration readiness reports
    #[command(subcommand)]
    Readiness(ReadinessCommands),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List all configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),
}

#[derive(Subcommand, Debug)]
enum ExportCommands {
    /// Export all users to CSV or JSON
    Users(cmd::export::ExportUsersArgs),

    /// Export all groups to CSV or JSON
    Groups(cmd::export::ExportGroupsArgs),

    /// Back up BitLocker recovery keys across the tenant
    Bitlocker(cmd::export::BitlockerBackupArgs),
}

#[derive(Subcommand, Debug)]
enum MailboxCommands {
    /// Audit inbox rules for external forwarding
    Rules(cmd::mailbox::RulesAuditArgs),
}

#[derive(Subcommand, Debug)]
enum OnedriveCommands {
    /// Provision OneDrive for a list of users
    Provision(cmd::onedrive::ProvisionArgs),
}

#[derive(Subcommand, Debug)]
enum ArchiveCommands {
    /// Copy a local directory to blob storage with azcopy
    Run(cmd::archive::ArchiveArgs),

    /// Verify azcopy is installed
    Check(cmd::archive::ArchiveCheckArgs),
}

#[derive(Subcommand, Debug)]
enum ReadinessCommands {
    /// Normalize a migration readiness-report CSV
    Process(cmd::readiness::ProcessArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("ops365=debug")
            .init();
    }

    match cli.command {
        Commands::Login(args) => cmd::login::login(args).await?,
        Commands::Logout(args) => cmd::login::logout(args).await?,
        Commands::Tenant(tenant_cmd) => match tenant_cmd {
            TenantCommands::Add(args) => cmd::tenant::add(args).await?,
            TenantCommands::List(args) => cmd::tenant::list(args).await?,
            TenantCommands::Switch(args) => cmd::tenant::switch(args).await?,
            TenantCommands::Remove(args) => cmd::tenant::remove(args).await?,
        },
        Commands::Export(export_cmd) => match export_cmd {
            ExportCommands::Users(args) => cmd::export::users(args).await?,
            ExportCommands::Groups(args) => cmd::export::groups(args).await?,
            ExportCommands::Bitlocker(args) => cmd::export::bitlocker(args).await?,
        },
        Commands::Mailbox(mailbox_cmd) => match mailbox_cmd {
            MailboxCommands::Rules(args) => cmd::mailbox::rules(args).await?,
        },
        Commands::Onedrive(onedrive_cmd) => match onedrive_cmd {
            OnedriveCommands::Provision(args) => cmd::onedrive::provision(args).await?,
        },
        Commands::Archive(archive_cmd) => match archive_cmd {
            ArchiveCommands::Run(args) => cmd::archive::run(args).await?,
            ArchiveCommands::Check(args) => cmd::archive::check(args).await?,
        },
        Commands::Readiness(readiness_cmd) => match readiness_cmd {
            ReadinessCommands::Process(args) => cmd::readiness::process(args).await?,
        },
    }

    Ok(())
}
