// # HTTP IP Source
//
// Resolves the host's public IPv4 address by asking an echo service that
// returns the caller's address as plain text (ipify by default).
//
// One request per call and no caching: the engine resolves exactly once
// per cycle and shares the answer across every name it checks.

use async_trait::async_trait;
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default echo service
pub const DEFAULT_IP_URL: &str = "https://api.ipify.org";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Plain-text echo service IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source that queries `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::config("IP source URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::ip_resolution(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_resolution(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_resolution(format!(
                "{} returned HTTP {}",
                self.url,
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_resolution(format!("Failed to read response: {}", e)))?;
        let text = body.trim();

        let ip: Ipv4Addr = text
            .parse()
            .map_err(|_| Error::ip_resolution(format!("Not an IPv4 address: '{}'", text)))?;

        tracing::debug!("Resolved public IP {} via {}", ip, self.url);
        Ok(ip)
    }
}
