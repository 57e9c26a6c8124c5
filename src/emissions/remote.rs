//! Remote CO2e estimation, used when no local factor exists.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::types::Category;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote host refused the connection outright
    #[error("connection refused")]
    ConnectionRefused,

    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// A service that can estimate kg CO2e for an activity.
#[async_trait]
pub trait RemoteEstimator: Send + Sync {
    /// Short identifier stored as the activity's `api_source`.
    fn source(&self) -> &str;

    async fn estimate(
        &self,
        category: Category,
        activity_type: &str,
        value: f64,
        unit: &str,
    ) -> std::result::Result<f64, RemoteError>;
}

/// Fixed-delay retry. `retries` counts attempts after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

/// Calls `estimator`, retrying failures per `policy`. A refused connection
/// is returned immediately.
pub async fn estimate_with_retry(
    estimator: &dyn RemoteEstimator,
    policy: RetryPolicy,
    category: Category,
    activity_type: &str,
    value: f64,
    unit: &str,
) -> std::result::Result<f64, RemoteError> {
    let mut attempt = 0;
    loop {
        match estimator.estimate(category, activity_type, value, unit).await {
            Ok(co2e) => return Ok(co2e),
            Err(RemoteError::ConnectionRefused) => {
                tracing::warn!(source = estimator.source(), "remote estimator refused connection");
                return Err(RemoteError::ConnectionRefused);
            }
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                tracing::info!(
                    source = estimator.source(),
                    error = %e,
                    "retrying remote estimate ({} attempts left)",
                    policy.retries - attempt + 1
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::error!(source = estimator.source(), error = %e, "remote estimate failed");
                return Err(e);
            }
        }
    }
}

/// Climatiq `/estimate` client.
pub struct ClimatiqEstimator {
    client: Client,
    base_url: String,
    api_key: String,
    region: String,
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    co2e: f64,
}

#[derive(Debug, Serialize)]
struct EmissionFactorSelector<'a> {
    category: &'a str,
    activity_id: &'a str,
    region: &'a str,
}

impl ClimatiqEstimator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        region: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            region: region.into(),
        })
    }

    fn estimate_url(&self) -> String {
        format!("{}/estimate", self.base_url)
    }
}

#[async_trait]
impl RemoteEstimator for ClimatiqEstimator {
    fn source(&self) -> &str {
        "climatiq"
    }

    async fn estimate(
        &self,
        category: Category,
        activity_type: &str,
        value: f64,
        unit: &str,
    ) -> std::result::Result<f64, RemoteError> {
        let body = json!({
            "emission_factor": EmissionFactorSelector {
                category: category.as_str(),
                activity_id: activity_type,
                region: &self.region,
            },
            "parameters": { unit: value },
        });

        let response = self
            .client
            .post(self.estimate_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let parsed: EstimateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(parsed.co2e)
    }
}

fn classify(err: reqwest::Error) -> RemoteError {
    if err.is_connect() && is_connection_refused(&err) {
        return RemoteError::ConnectionRefused;
    }
    RemoteError::Transport(err.to_string())
}

fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}
