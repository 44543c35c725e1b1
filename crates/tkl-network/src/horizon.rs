//! Horizon-backed [`NetworkClient`].
//!
//! Account and asset lookups go to a Horizon server; icon probing is a plain
//! GET against the icon URL. Transient failures (transport, 429, 5xx) are
//! retried with the client's [`RetryPolicy`]; everything else surfaces
//! immediately as a [`NetworkError`].

use crate::{NetworkClient, NetworkError, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HorizonClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HorizonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            retry: RetryPolicy::once(),
        })
    }

    /// `true` if `account_id` holds a trustline (a balance entry) for
    /// `code:issuer`. An unknown account is an error, not `false`.
    pub async fn has_trustline(
        &self,
        account_id: &str,
        code: &str,
        issuer: &str,
    ) -> Result<bool, NetworkError> {
        let url = self.url(&format!("accounts/{account_id}"));
        let resp = self.get(&url, &[]).await?;
        if !resp.status().is_success() {
            return Err(api_error(&resp));
        }
        let body: AccountResponse = decode(resp).await?;
        Ok(body.balances.iter().any(|b| {
            b.asset_code.as_deref() == Some(code) && b.asset_issuer.as_deref() == Some(issuer)
        }))
    }

    /// Retry transient failures with `policy`. Fees in the policy are ignored
    /// here; only the attempt count and delay schedule apply.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, NetworkError> {
        self.retry
            .run_if(
                |attempt| async move {
                    debug!(url, attempt = attempt.number, "GET");
                    let resp = self
                        .http
                        .get(url)
                        .query(query)
                        .send()
                        .await
                        .map_err(|e| NetworkError::Transport(e.to_string()))?;
                    let status = resp.status();
                    if status.is_server_error() || status.as_u16() == 429 {
                        return Err(NetworkError::Api {
                            status: status.as_u16(),
                            message: status.canonical_reason().unwrap_or("").to_string(),
                        });
                    }
                    Ok(resp)
                },
                NetworkError::is_transient,
            )
            .await
            .map_err(|e| e.last_error)
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, NetworkError> {
    resp.json::<T>()
        .await
        .map_err(|e| NetworkError::Decode(e.to_string()))
}

fn api_error(resp: &reqwest::Response) -> NetworkError {
    let status = resp.status();
    NetworkError::Api {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("").to_string(),
    }
}

#[async_trait::async_trait]
impl NetworkClient for HorizonClient {
    async fn home_domain(&self, account_id: &str) -> Result<Option<String>, NetworkError> {
        let url = self.url(&format!("accounts/{account_id}"));
        let resp = self.get(&url, &[]).await?;

        // Unknown account: it publishes no domain.
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(api_error(&resp));
        }

        let body: AccountResponse = decode(resp).await?;
        Ok(body.home_domain.filter(|d| !d.is_empty()))
    }

    async fn asset_exists(&self, code: &str, issuer: &str) -> Result<bool, NetworkError> {
        let url = self.url("assets");
        let resp = self
            .get(&url, &[("asset_code", code), ("asset_issuer", issuer)])
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(&resp));
        }

        let body: AssetsResponse = decode(resp).await?;
        Ok(!body.embedded.records.is_empty())
    }

    async fn fetch_content_type(&self, url: &str) -> Result<String, NetworkError> {
        let resp = self.get(url, &[]).await?;
        if !resp.status().is_success() {
            return Err(api_error(&resp));
        }
        resp.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| NetworkError::Decode("response has no content-type".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    home_domain: Option<String>,
    #[serde(default)]
    balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
struct Balance {
    #[serde(default)]
    asset_code: Option<String>,
    #[serde(default)]
    asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    #[serde(rename = "_embedded")]
    embedded: Embedded,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}
