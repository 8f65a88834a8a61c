//! Remote Rate Client.
//!
//! Talks to the rate-information service: the per-provider rate document,
//! provider discovery and the best-effort remote refresh ping.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{NotifyError, ProviderDiscoveryError, RemoteError};
use crate::source::RateSource;
use crate::types::{ProviderCatalog, ProvidersResponse, RatesPayload};

/// HTTP client for the rate-information service.
///
/// Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct RatesClient {
    base_url: String,
    http: Client,
}

/// What the setup flow learns from a successful provider probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInfo {
    pub title: String,
    pub utility: Option<String>,
}

impl RatesClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, Client::new())
    }

    pub fn with_http(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/rates/{provider}/residential`.
    ///
    /// Anything other than HTTP 200 with a JSON object carrying a `rates`
    /// key is a failure.
    pub async fn fetch_rates(&self, provider: &str) -> Result<RatesPayload, RemoteError> {
        let url = format!("{}/rates/{}/residential", self.base_url, provider);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| RemoteError::network(err.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|err| RemoteError::parse(err.to_string()))?;

        if body.get("rates").is_none() {
            return Err(RemoteError::MissingRates);
        }

        serde_json::from_value(body).map_err(|err| RemoteError::parse(err.to_string()))
    }

    /// `GET {base}/providers`, reporting why discovery failed.
    pub async fn try_fetch_providers(&self) -> Result<ProviderCatalog, ProviderDiscoveryError> {
        let url = format!("{}/providers", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| ProviderDiscoveryError::Network {
                message: err.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(ProviderDiscoveryError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response
            .json::<ProvidersResponse>()
            .await
            .map_err(|err| ProviderDiscoveryError::Parse {
                message: err.to_string(),
            })?;

        let catalog = ProviderCatalog::from(body);
        if catalog.is_empty() {
            return Err(ProviderDiscoveryError::Empty);
        }
        Ok(catalog)
    }

    /// Provider catalog for the setup flow. Never fails: any discovery
    /// problem yields the built-in table.
    pub async fn fetch_providers(&self) -> ProviderCatalog {
        match self.try_fetch_providers().await {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::debug!("Provider discovery failed, using built-in table: {}", err);
                ProviderCatalog::builtin()
            }
        }
    }

    /// `GET {base}/internal/refresh/{provider}`.
    pub async fn try_trigger_remote_refresh(&self, provider: &str) -> Result<(), NotifyError> {
        let url = format!("{}/internal/refresh/{}", self.base_url, provider);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| NotifyError::network(err.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(NotifyError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Best-effort variant of [`Self::try_trigger_remote_refresh`]; failures
    /// are logged and dropped.
    pub async fn trigger_remote_refresh(&self, provider: &str) {
        if let Err(err) = self.try_trigger_remote_refresh(provider).await {
            log_notify_failure(&self.base_url, provider, &err);
        }
    }

    /// Connectivity check used before an instance is configured.
    pub async fn validate_provider(&self, provider: &str) -> Result<ProviderInfo, RemoteError> {
        let payload = self.fetch_rates(provider).await?;
        Ok(ProviderInfo {
            title: format!("HA Energy Rates ({})", provider),
            utility: payload.utility,
        })
    }
}

/// Non-200 replies are warnings, transport failures are errors.
pub fn log_notify_failure(base_url: &str, provider: &str, err: &NotifyError) {
    let url = format!("{}/internal/refresh/{}", base_url, provider);
    match err {
        NotifyError::Status { status } => {
            tracing::warn!("Force refresh returned HTTP {} from {}", status, url);
        }
        NotifyError::Network { message } => {
            tracing::error!("Force refresh failed: {}", message);
        }
    }
}

#[async_trait]
impl RateSource for RatesClient {
    async fn fetch_rates(&self, provider: &str) -> Result<RatesPayload, RemoteError> {
        RatesClient::fetch_rates(self, provider).await
    }

    async fn request_remote_refresh(&self, provider: &str) -> Result<(), NotifyError> {
        self.try_trigger_remote_refresh(provider).await
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
