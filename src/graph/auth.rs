use crate::config::{ConfigManager, TenantConfig, TokenCache};
use crate::error::{Ops365Error, Result};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, DeviceAuthorizationUrl, EmptyExtraDeviceAuthorizationFields,
    Scope, TokenResponse, TokenUrl, basic::BasicClient, reqwest::async_http_client,
};
use std::time::Duration;

const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// OAuth2 flows against the Microsoft identity platform, with on-disk token
/// caching per tenant.
pub struct Authenticator {
    config_manager: ConfigManager,
}

impl Authenticator {
    pub fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    fn oauth_endpoints(
        tenant_id: &str,
    ) -> Result<(AuthUrl, TokenUrl, DeviceAuthorizationUrl)> {
        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Ops365Error::AuthError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(format!(
            "{}/{}/oauth2/v2.0/token",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Ops365Error::AuthError(format!("Invalid token URL: {}", e)))?;

        let device_url = DeviceAuthorizationUrl::new(format!(
            "{}/{}/oauth2/v2.0/devicecode",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Ops365Error::AuthError(format!("Invalid device auth URL: {}", e)))?;

        Ok((auth_url, token_url, device_url))
    }

    fn cache_from_token(
        tenant_id: &str,
        token: &impl TokenResponse<oauth2::basic::BasicTokenType>,
    ) -> TokenCache {
        let lifetime = token.expires_in().unwrap_or(Duration::from_secs(3600));
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(lifetime)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        TokenCache {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_at,
            tenant_id: tenant_id.to_string(),
        }
    }

    /// Interactive device code flow.
    pub async fn login_device_code(&self, tenant: &TenantConfig) -> Result<TokenCache> {
        println!(
            "Starting device code authentication for tenant '{}'...",
            tenant.name
        );

        let (auth_url, token_url, device_url) = Self::oauth_endpoints(&tenant.tenant_id)?;
        let client_id = ClientId::new(tenant.client_id.clone());

        let client = BasicClient::new(client_id, None, auth_url, Some(token_url))
            .set_device_authorization_url(device_url);

        let details: oauth2::DeviceAuthorizationResponse<EmptyExtraDeviceAuthorizationFields> =
            client
                .exchange_device_code()
                .map_err(|e| {
                    Ops365Error::AuthError(format!("Device code exchange failed: {}", e))
                })?
                .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
                .request_async(async_http_client)
                .await
                .map_err(|e| {
                    Ops365Error::AuthError(format!("Device authorization request failed: {}", e))
                })?;

        println!("\nPlease visit: {}", details.verification_uri().as_str());
        println!("Enter code:   {}\n", details.user_code().secret());

        let token = client
            .exchange_device_access_token(&details)
            .request_async(async_http_client, tokio::time::sleep, None)
            .await
            .map_err(|e| Ops365Error::AuthError(format!("Token exchange failed: {}", e)))?;

        let cache = Self::cache_from_token(&tenant.tenant_id, &token);
        self.config_manager.save_token(&tenant.name, &cache)?;

        println!("Authentication successful.");
        Ok(cache)
    }

    /// Non-interactive client credentials flow.
    pub async fn login_client_credentials(&self, tenant: &TenantConfig) -> Result<TokenCache> {
        let secret = tenant.client_secret.as_ref().ok_or_else(|| {
            Ops365Error::AuthError("Client secret required for client credentials flow".into())
        })?;

        println!(
            "Authenticating with client credentials for tenant '{}'...",
            tenant.name
        );

        let (auth_url, token_url, _) = Self::oauth_endpoints(&tenant.tenant_id)?;
        let client = BasicClient::new(
            ClientId::new(tenant.client_id.clone()),
            Some(ClientSecret::new(secret.clone())),
            auth_url,
            Some(token_url),
        );

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                Ops365Error::AuthError(format!("Client credentials exchange failed: {}", e))
            })?;

        let mut cache = Self::cache_from_token(&tenant.tenant_id, &token);
        // Client credentials flows never issue refresh tokens.
        cache.refresh_token = None;
        self.config_manager.save_token(&tenant.name, &cache)?;

        println!("Authentication successful.");
        Ok(cache)
    }

    /// Valid cached access token for a tenant, or an error telling the user
    /// to log in again.
    pub async fn access_token(&self, tenant_name: &str) -> Result<String> {
        match self.config_manager.load_token(tenant_name) {
            Ok(token) => Ok(token.access_token),
            Err(Ops365Error::AuthError(_)) => Err(Ops365Error::TokenNotFound),
            Err(e) => Err(e),
        }
    }

    /// Drop the cached token for a tenant.
    pub fn logout(&self, tenant_name: &str) -> Result<()> {
        self.config_manager.delete_token(tenant_name)?;
        println!("Logged out from tenant '{}'", tenant_name);
        Ok(())
    }
}
