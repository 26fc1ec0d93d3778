use super::VenueRemover;
use crate::config::ClientConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Sends venue deletions to a running fyyur server.
pub struct HttpVenueClient {
    client: Client,
    base_url: Url,
}

impl HttpVenueClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid client.base_url {}", config.base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }
}

impl VenueRemover for HttpVenueClient {
    fn delete(&self, path: &str) -> Result<StatusCode> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Cannot build request URL from {path}"))?;

        let response = self
            .client
            .delete(url.clone())
            .send()
            .with_context(|| format!("DELETE {url} request failed"))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "DELETE completed");

        Ok(status)
    }
}
