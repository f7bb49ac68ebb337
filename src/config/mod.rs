use crate::error::{Ops365Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub current_tenant: Option<String>,

    #[serde(default)]
    pub log_level: String,

    /// Defaults for bulk runs, overridable per-invocation by CLI flags.
    #[serde(default)]
    pub run_defaults: RunDefaults,
}

/// Default knobs for bulk operations.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RunDefaults {
    /// Additional attempts after the first, per identity.
    #[serde(default = "RunDefaults::default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts for the same identity, in seconds.
    #[serde(default = "RunDefaults::default_delay_secs")]
    pub retry_delay_secs: u64,

    /// Pacing delay between consecutive identities, in seconds.
    #[serde(default = "RunDefaults::default_delay_secs")]
    pub pacing_secs: u64,
}

impl RunDefaults {
    fn default_max_retries() -> u32 {
        2
    }

    fn default_delay_secs() -> u64 {
        2
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            retry_delay_secs: Self::default_delay_secs(),
            pacing_secs: Self::default_delay_secs(),
        }
    }
}

/// Tenant-specific configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TenantConfig {
    pub name: String,
    pub tenant_id: String,
    pub client_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub auth_type: AuthType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    DeviceCode,
    ClientCredentials,
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "ops365", "ops365").ok_or_else(|| {
            Ops365Error::ConfigError("Failed to determine config directory".into())
        })?;

        let config_dir = project_dirs.config_dir().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self { config_dir })
    }

    pub fn load() -> Result<Self> {
        Self::new()
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn tenants_file(&self) -> PathBuf {
        self.config_dir.join("tenants.toml")
    }

    pub fn token_cache_file(&self, tenant_name: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_name))
    }

    /// Load main config, falling back to defaults when the file is absent.
    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)
            .map_err(|e| Ops365Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    pub fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        let tenants_path = self.tenants_file();

        if !tenants_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(tenants_path)?;

        #[derive(Deserialize)]
        struct TenantsFile {
            tenants: Vec<TenantConfig>,
        }

        let file: TenantsFile = toml::from_str(&contents)?;
        Ok(file.tenants)
    }

    pub fn save_tenants(&self, tenants: &[TenantConfig]) -> Result<()> {
        #[derive(Serialize)]
        struct TenantsFile<'a> {
            tenants: &'a [TenantConfig],
        }

        let file = TenantsFile { tenants };
        let contents = toml::to_string_pretty(&file)
            .map_err(|e| Ops365Error::ConfigError(format!("Failed to serialize tenants: {}", e)))?;
        fs::write(self.tenants_file(), contents)?;
        Ok(())
    }

    /// Add or replace a tenant by name.
    pub fn add_tenant(&self, tenant: TenantConfig) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        tenants.retain(|t| t.name != tenant.name);
        tenants.push(tenant);
        self.save_tenants(&tenants)
    }

    pub fn get_tenant(&self, name: &str) -> Result<TenantConfig> {
        let tenants = self.load_tenants()?;
        tenants
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Ops365Error::TenantNotFound(name.to_string()))
    }

    pub fn get_active_tenant(&self) -> Result<Option<TenantConfig>> {
        let config = self.load_config()?;

        match config.current_tenant {
            Some(tenant_name) => Ok(Some(self.get_tenant(&tenant_name)?)),
            None => Ok(None),
        }
    }

    /// Active tenant or a config error pointing the user at login.
    pub fn require_active_tenant(&self) -> Result<TenantConfig> {
        self.get_active_tenant()?.ok_or_else(|| {
            Ops365Error::ConfigError(
                "No active tenant. Run 'ops365 login' or 'ops365 tenant switch <name>' first."
                    .into(),
            )
        })
    }

    pub fn set_active_tenant(&self, tenant_name: &str) -> Result<()> {
        let _tenant = self.get_tenant(tenant_name)?;

        let mut config = self.load_config()?;
        config.current_tenant = Some(tenant_name.to_string());
        self.save_config(&config)
    }

    pub fn remove_tenant(&self, tenant_name: &str) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        let original_len = tenants.len();
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(tenant_name));

        if tenants.len() == original_len {
            return Err(Ops365Error::TenantNotFound(tenant_name.to_string()));
        }

        self.save_tenants(&tenants)?;
        let _ = self.delete_token(tenant_name);

        let config = self.load_config()?;
        if config.current_tenant.as_deref() == Some(tenant_name) {
            let mut updated = config;
            updated.current_tenant = None;
            self.save_config(&updated)?;
        }

        Ok(())
    }

    pub fn save_token(&self, tenant_name: &str, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(tenant_name), contents)?;
        Ok(())
    }

    pub fn load_token(&self, tenant_name: &str) -> Result<TokenCache> {
        let token_path = self.token_cache_file(tenant_name);

        if !token_path.exists() {
            return Err(Ops365Error::TokenNotFound);
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.expires_at < chrono::Utc::now() {
            return Err(Ops365Error::AuthError("Token expired".into()));
        }

        Ok(token)
    }

    pub fn delete_token(&self, tenant_name: &str) -> Result<()> {
        let token_path = self.token_cache_file(tenant_name);

        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        Ok(())
    }

    /// Load a tenant from `{config_dir}/{name}.env`.
    ///
    /// Format:
    /// ```text
    /// TENANT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_SECRET=your-secret-here
    /// ```
    pub fn load_env_file(&self, name: &str) -> Result<Option<TenantConfig>> {
        let env_path = self.config_dir.join(format!("{}.env", name.to_lowercase()));

        if !env_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&env_path)?;
        let vars = parse_env_file(&contents);

        let (Some(tenant_id), Some(client_id)) = (vars.get("TENANT_ID"), vars.get("CLIENT_ID"))
        else {
            return Ok(None);
        };
        let client_secret = vars.get("CLIENT_SECRET").cloned();

        Ok(Some(TenantConfig {
            name: name.to_string(),
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            auth_type: if client_secret.is_some() {
                AuthType::ClientCredentials
            } else {
                AuthType::DeviceCode
            },
            client_secret,
            description: vars.get("DESCRIPTION").cloned(),
        }))
    }

    /// Get tenant by name, falling back to a `{name}.env` import.
    pub fn get_tenant_or_env(&self, name: &str) -> Result<TenantConfig> {
        if let Ok(tenant) = self.get_tenant(name) {
            return Ok(tenant);
        }

        if let Some(tenant) = self.load_env_file(name)? {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        Err(Ops365Error::TenantNotFound(name.to_string()))
    }
}

/// Parse `KEY=VALUE` lines, ignoring comments and blanks. Keys are
/// case-insensitive and surrounding quotes are stripped from values.
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(pos) = line.find('=') else { continue };
        let key = line[..pos].trim().to_uppercase();
        let value = line[pos + 1..].trim();

        let value = if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value[1..value.len() - 1].to_string()
        } else {
            value.to_string()
        };

        vars.insert(key, value);
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_match_documented_values() {
        let defaults = RunDefaults::default();
        assert_eq!(defaults.max_retries, 2);
        assert_eq!(defaults.retry_delay_secs, 2);
        assert_eq!(defaults.pacing_secs, 2);
    }

    #[test]
    fn config_without_run_defaults_fills_them_in() {
        let config: Config = toml::from_str("current_tenant = \"acme\"").unwrap();
        assert_eq!(config.current_tenant.as_deref(), Some("acme"));
        assert_eq!(config.run_defaults.max_retries, 2);
    }

    #[test]
    fn env_parser_handles_quotes_and_comments() {
        let vars = parse_env_file(
            "# client registration\nTENANT_ID=abc-123\nclient_id = \"def-456\"\n\nbad line\n",
        );
        assert_eq!(vars.get("TENANT_ID").map(String::as_str), Some("abc-123"));
        assert_eq!(vars.get("CLIENT_ID").map(String::as_str), Some("def-456"));
        assert_eq!(vars.len(), 2);
    }
}
