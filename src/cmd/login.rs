use crate::config::{AuthType, ConfigManager, TenantConfig};
use crate::error::Result;
use crate::graph::auth::Authenticator;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Tenant name. Falls back to {config_dir}/{name}.env if not configured yet
    #[arg(index = 1)]
    name: Option<String>,

    /// Tenant ID (Entra ID tenant ID) for quick setup
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client ID (application ID) for quick setup
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret (switches to client credentials flow)
    #[arg(long)]
    client_secret: Option<String>,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Tenant name (defaults to the active tenant)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Logout from all tenants
    #[arg(long)]
    all: bool,
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = Authenticator::new(config_manager.clone());

    let tenant_config = if let Some(name) = &args.name {
        let tenant = config_manager.get_tenant_or_env(name).map_err(|_| {
            crate::error::Ops365Error::ConfigError(format!(
                "Tenant '{}' not found.\n\n\
                Either add it first:\n  \
                ops365 tenant add {} --tenant-id <id> --client-id <id>\n\n\
                or create {}/{}.env with:\n  \
                TENANT_ID=your-tenant-id\n  \
                CLIENT_ID=your-client-id\n  \
                CLIENT_SECRET=your-secret",
                name,
                name,
                config_manager.config_file().parent().unwrap_or_else(|| std::path::Path::new(".")).display(),
                name.to_lowercase()
            ))
        })?;

        println!(
            "{} Loaded tenant: {} ({})",
            "✓".green(),
            name.bold(),
            tenant.description.as_deref().unwrap_or("")
        );

        tenant
    } else if let (Some(tenant_id), Some(client_id)) = (&args.tenant_id, &args.client_id) {
        // Quick setup: persist a config on the fly and use it.
        let name = tenant_id.split('-').next().unwrap_or("my-tenant").to_string();
        println!(
            "{} Quick setup: saving tenant '{}'",
            "→".cyan(),
            name.bold()
        );

        let tenant = TenantConfig {
            name: name.clone(),
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            auth_type: if args.client_secret.is_some() {
                AuthType::ClientCredentials
            } else {
                AuthType::DeviceCode
            },
            client_secret: args.client_secret.clone(),
            description: args.description,
        };

        config_manager.add_tenant(tenant.clone())?;
        tenant
    } else {
        return Err(crate::error::Ops365Error::InvalidArgument(
            "Usage:\n  \
            ops365 login NAME                          # existing config or NAME.env\n  \
            ops365 login --tenant-id ID --client-id ID # quick setup"
                .into(),
        ));
    };

    match tenant_config.auth_type {
        AuthType::DeviceCode => auth.login_device_code(&tenant_config).await?,
        AuthType::ClientCredentials => auth.login_client_credentials(&tenant_config).await?,
    };

    config_manager.set_active_tenant(&tenant_config.name)?;
    println!(
        "\n{} Active tenant: {}",
        "→".cyan(),
        tenant_config.name.bold()
    );

    Ok(())
}

pub async fn logout(args: LogoutArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = Authenticator::new(config_manager.clone());

    if args.all {
        for tenant in &config_manager.load_tenants()? {
            auth.logout(&tenant.name)?;
        }
        println!("{} Logged out from all tenants", "✓".green());
    } else if let Some(tenant_name) = &args.tenant {
        auth.logout(tenant_name)?;
    } else {
        let config = config_manager.load_config()?;
        match config.current_tenant {
            Some(current) => auth.logout(&current)?,
            None => println!("{} No active tenant", "!".yellow()),
        }
    }

    Ok(())
}
