//! API client for the remediator HTTP service

use anyhow::{Context, Result};
use remediation_lib::{HandlerResponse, HealthResponse, ReadinessResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// POST a fault event. Failed and rejected events come back with non-2xx
    /// statuses but still carry a `HandlerResponse` body.
    pub async fn post_event(&self, event: &Value) -> Result<(u16, HandlerResponse)> {
        let url = self.base_url.join("events").context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .context("Failed to send event")?;

        let status = response.status().as_u16();
        let body = response.text().await.context("Failed to read response")?;
        let parsed = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected response ({}): {}", status, body))?;
        Ok((status, parsed))
    }

    pub async fn health(&self) -> Result<(u16, HealthResponse)> {
        self.get_any_status("healthz").await
    }

    pub async fn readiness(&self) -> Result<(u16, ReadinessResponse)> {
        self.get_any_status("readyz").await
    }

    /// GET a JSON body, accepting 503 as a meaningful answer
    async fn get_any_status<T: DeserializeOwned>(&self, path: &str) -> Result<(u16, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let parsed = response.json().await.context("Failed to parse response")?;
        Ok((status.as_u16(), parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("http://remediator.ops:8080").is_ok());
    }

    #[test]
    fn test_joins_paths_under_base() {
        let client = ApiClient::new("http://remediator.ops:8080/").unwrap();
        let url = client.base_url.join("events").unwrap();
        assert_eq!(url.as_str(), "http://remediator.ops:8080/events");
    }
}
