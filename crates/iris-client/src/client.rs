//! Iris gateway HTTP client.

use crate::error::IrisError;
use crate::types::*;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default bound for a single sidecar round trip.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for the Iris gateway sidecar (`/aot`, `/query`).
#[derive(Clone)]
pub struct IrisClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl IrisClient {
    /// Create a client with its own connection pool.
    pub fn new(base_url: impl Into<String>) -> Result<Self, IrisError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client over an existing connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the gateway endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the gateway can currently issue a credential.
    pub async fn health_check(&self) -> bool {
        self.aot().await.is_ok()
    }

    /// Fetch the current access token and device id.
    #[instrument(skip(self), fields(endpoint = %self.base_url))]
    pub async fn aot(&self) -> Result<Aot, IrisError> {
        let response = self
            .client
            .get(format!("{}/aot", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;

        // Only a 200 carries a token.
        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("AOT request failed with status {}", status);
            return Err(IrisError::Api { status, message });
        }

        let body: AotResponse = response.json().await?;
        if !body.success {
            return Err(IrisError::AotRejected);
        }

        let payload = body.aot.ok_or(IrisError::MissingField("aot"))?;
        let access_token = payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(IrisError::MissingField("access_token"))?;
        let device_id = payload
            .d_id
            .filter(|id| !id.is_empty())
            .ok_or(IrisError::MissingField("d_id"))?;

        debug!("Fetched AOT for device {}", device_id);
        Ok(Aot {
            access_token: SecretString::new(access_token),
            device_id,
        })
    }

    /// Run a single parameterized statement against the room/member store.
    #[instrument(skip(self, bind), fields(endpoint = %self.base_url))]
    pub async fn query(&self, sql: &str, bind: &[String]) -> Result<Vec<Row>, IrisError> {
        let request = QueryRequest { query: sql, bind };

        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("Query failed with status {}", status);
            return Err(IrisError::Api { status, message });
        }

        let body: QueryResponse = response.json().await?;
        let rows = body.data.unwrap_or_default();
        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}
