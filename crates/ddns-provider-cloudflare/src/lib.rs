// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// - One HTTP request per trait call, no retries, no caching
// - 10 second timeout per request
// - Every failure (transport, non-2xx, `success=false` envelope) is an
//   `Error::Provider`
// - The API token never appears in logs, errors or `Debug` output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::traits::{DnsProvider, DnsProviderFactory, ProviderRecord};
use ddns_core::{Error, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// TTL value Cloudflare treats as "automatic"
const AUTO_TTL: u32 = 1;

const PROVIDER_NAME: &str = "Cloudflare";

/// Response wrapper used by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareRecord {
    id: String,
    name: String,
    content: String,
    #[serde(default = "auto_ttl")]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
    #[serde(default)]
    zone_id: String,
}

fn auto_ttl() -> u32 {
    AUTO_TTL
}

impl CloudflareRecord {
    fn into_record(self, zone_id: &str) -> ProviderRecord {
        ProviderRecord {
            id: self.id,
            name: self.name,
            content: self.content,
            ttl: self.ttl,
            proxied: self.proxied,
            zone_id: if self.zone_id.is_empty() {
                zone_id.to_string()
            } else {
                self.zone_id
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// Stateless and single-shot: whether an update is needed, and what to do
/// when a call fails, is decided by the engine.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// `api_token` needs Zone:DNS:Edit permission on every configured zone.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id)
    }

    /// Send one authenticated request and unwrap the response envelope
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&RecordPayload<'_>>,
    ) -> Result<T> {
        tracing::debug!("{} {} query={:?}", method, url, query);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("Network error calling Cloudflare API ({} {}): {}", method, url, e),
            )
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        if !status.is_success() {
            return Err(status_error(status, &method, url, &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            let messages = envelope
                .errors
                .iter()
                .map(|m| format!("{} (code {})", m.message, m.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "Cloudflare API returned success=false for {} {}: {}",
                    method, url, messages
                ),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "Invalid response format: result is missing")
        })
    }
}

/// Map an HTTP error status to a provider error
fn status_error(status: StatusCode, method: &Method, url: &str, body: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("Not found: {} {}. Status: {}", method, url, status),
        409 => format!(
            "Conflict: Record is being updated by another process. Status: {}",
            status
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!("Cloudflare server error (transient): {} - {}", status, body),
        _ => format!(
            "Cloudflare API error {} for {} {}: {}",
            status.as_u16(),
            method,
            url,
            body
        ),
    };
    Error::provider(PROVIDER_NAME, message)
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn get_record(&self, zone_id: &str, name: &str) -> Result<Option<ProviderRecord>> {
        let records: Vec<CloudflareRecord> = self
            .request(
                Method::GET,
                &self.records_url(zone_id),
                &[("type", "A"), ("name", name)],
                None,
            )
            .await?;

        Ok(records.into_iter().next().map(|r| r.into_record(zone_id)))
    }

    async fn create_record(&self, zone_id: &str, name: &str, ip: Ipv4Addr) -> Result<ProviderRecord> {
        let payload = RecordPayload {
            record_type: "A",
            name,
            content: ip.to_string(),
            ttl: AUTO_TTL,
            proxied: false,
        };
        let record: CloudflareRecord = self
            .request(Method::POST, &self.records_url(zone_id), &[], Some(&payload))
            .await?;

        tracing::debug!("Created Cloudflare record {} -> {}", name, ip);
        Ok(record.into_record(zone_id))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record: &ProviderRecord,
        new_ip: Ipv4Addr,
    ) -> Result<ProviderRecord> {
        let payload = RecordPayload {
            record_type: "A",
            name: &record.name,
            content: new_ip.to_string(),
            ttl: record.ttl,
            proxied: record.proxied,
        };
        let updated: CloudflareRecord = self
            .request(
                Method::PUT,
                &self.record_url(zone_id, &record.id),
                &[],
                Some(&payload),
            )
            .await?;

        Ok(updated.into_record(zone_id))
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .request(Method::DELETE, &self.record_url(zone_id, record_id), &[], None)
            .await?;
        Ok(())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ProviderRecord>> {
        let records: Vec<CloudflareRecord> = self
            .request(Method::GET, &self.records_url(zone_id), &[("type", "A")], None)
            .await?;

        Ok(records
            .into_iter()
            .map(|r| r.into_record(zone_id))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token } => {
                Ok(Arc::new(CloudflareProvider::new(api_token.clone())?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
