pub mod auth;
pub mod directory;

use crate::config::ConfigManager;
use crate::error::{FailureKind, GraphErrorBody, Ops365Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const GRAPH_API_BETA: &str = "https://graph.microsoft.com/beta";

/// Microsoft Graph client.
///
/// Requests are made exactly once; every HTTP failure is classified into a
/// [`FailureKind`] and returned immediately. Bounded retry is the bulk
/// layer's job ([`crate::bulk::retry`]), not this client's, so that retry
/// policy lives in one place instead of inside every verb.
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
    beta_url: String,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: GRAPH_API_BASE.to_string(),
            beta_url: GRAPH_API_BETA.to_string(),
        }
    }

    /// Point both endpoints at a custom base URL. Used by the wiremock tests.
    pub fn with_base_url(access_token: String, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            access_token,
            beta_url: base_url.clone(),
            base_url,
        }
    }

    /// Create a client for the given tenant, loading its cached token.
    pub async fn from_config(config: &ConfigManager, tenant_name: &str) -> Result<Self> {
        let authenticator = auth::Authenticator::new(config.clone());
        let access_token = authenticator.access_token(tenant_name).await?;
        Ok(Self::new(access_token))
    }

    fn url(&self, base: &str, endpoint: &str) -> String {
        format!("{}/{}", base, endpoint.trim_start_matches('/'))
    }

    pub async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(&self.base_url, endpoint);
        self.execute(self.client.get(url)).await
    }

    pub async fn get_beta<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(&self.beta_url, endpoint);
        self.execute(self.client.get(url)).await
    }

    pub async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.url(&self.base_url, endpoint);
        self.execute(self.client.post(url).json(body)).await
    }

    pub async fn patch<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.url(&self.base_url, endpoint);
        self.execute(self.client.patch(url).json(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<()> {
        let url = self.url(&self.base_url, endpoint);
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// GET an absolute URL. Needed to follow `@odata.nextLink`, which Graph
    /// returns fully qualified.
    async fn get_absolute<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        self.execute(self.client.get(url)).await
    }

    async fn execute<R: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<R> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<R>().await?)
    }

    /// Turn a non-success response into a classified Graph error.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = GraphErrorBody::parse(&body);
        let kind = classify(status, parsed.code.as_deref());
        tracing::debug!(%status, ?kind, "graph request failed");

        Err(Ops365Error::GraphApiError {
            kind,
            message: format!("HTTP {}: {}", status, parsed.render(&body)),
        })
    }
}

/// Map an HTTP status (refined by the Graph error code where present) to a
/// failure kind.
///
/// 404 is the missing target. 429, 408, and 5xx resolve on their own. The
/// rest of 4xx (bad requests, expired tokens, missing permissions) will
/// fail the same way however often we retry.
fn classify(status: StatusCode, code: Option<&str>) -> FailureKind {
    match code {
        Some("Request_ResourceNotFound") | Some("ResourceNotFound") | Some("NotFound") => {
            return FailureKind::NotFound;
        }
        Some("TooManyRequests") | Some("ServiceNotAvailable") | Some("ActivityLimitReached") => {
            return FailureKind::Transient;
        }
        _ => {}
    }

    if status == StatusCode::NOT_FOUND {
        FailureKind::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Standard OData page: `value` array plus optional `@odata.nextLink`.
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count")]
    pub count: Option<i64>,
}

impl GraphClient {
    /// Fetch every page of a paginated endpoint, following `@odata.nextLink`
    /// to the end.
    pub async fn get_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        let first = self.url(&self.base_url, endpoint);
        self.collect_pages(first).await
    }

    /// Same as [`get_all_pages`](Self::get_all_pages) against the beta endpoint.
    pub async fn get_all_pages_beta<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        let first = self.url(&self.beta_url, endpoint);
        self.collect_pages(first).await
    }

    async fn collect_pages<T: for<'de> Deserialize<'de>>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = first_url;

        loop {
            let page: PaginatedResponse<T> = self.get_absolute(&current_url).await?;
            all_items.extend(page.value);

            match page.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}
