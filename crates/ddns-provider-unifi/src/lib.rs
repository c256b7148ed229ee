// # UniFi DNS Policy Provider
//
// Manages A-record DNS policies on one site of a local UniFi Network
// controller through its integration API
// (`https://{host}/proxy/network/integration/v1`).
//
// Mapping onto the shared record shape:
// - zone id   → UniFi site id
// - record id → DNS policy id
// - name      → `domain`
// - content   → `ipv4Address`
// - ttl       → `ttlSeconds`
// - proxied   → always false
//
// Controllers ship self-signed certificates, so certificate verification is
// disabled for this client only. The API key never appears in logs, errors
// or `Debug` output.

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

/// Path appended to the controller host
const UNIFI_API_PATH: &str = "/proxy/network/integration/v1";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// TTL for new policies (the controller's own default)
const DEFAULT_TTL: u32 = 14_400;

/// Page size for policy listing (API maximum)
const LIST_LIMIT: &str = "200";

/// Error bodies are cut to this many characters
const ERROR_BODY_LIMIT: usize = 200;

const PROVIDER_NAME: &str = "UniFi";

const A_RECORD: &str = "A_RECORD";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DnsPolicy {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    policy_type: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    ipv4_address: String,
    #[serde(default = "default_ttl")]
    ttl_seconds: u32,
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl DnsPolicy {
    fn into_record(self, site_id: &str) -> ProviderRecord {
        ProviderRecord {
            id: self.id,
            name: self.domain,
            content: self.ipv4_address,
            ttl: self.ttl_seconds,
            proxied: false,
            zone_id: site_id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyPage {
    #[serde(default)]
    data: Vec<DnsPolicy>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyPayload<'a> {
    #[serde(rename = "type")]
    policy_type: &'static str,
    enabled: bool,
    domain: &'a str,
    ipv4_address: String,
    ttl_seconds: u32,
}

/// UniFi Network DNS policy provider
pub struct UnifiProvider {
    /// ⚠️ NEVER log this value
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for UnifiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiProvider")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl UnifiProvider {
    /// Create a provider for the controller at `host` (name or address)
    pub fn new(host: &str, api_key: impl Into<String>) -> Result<Self> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::config("UniFi host cannot be empty"));
        }
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("UniFi API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: format!("https://{}{}", host, UNIFI_API_PATH),
            client,
        })
    }

    /// Overrides the full API base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn policies_url(&self, site_id: &str) -> String {
        format!("{}/sites/{}/dns-policies", self.base_url, site_id)
    }

    fn policy_url(&self, site_id: &str, policy_id: &str) -> String {
        format!("{}/sites/{}/dns-policies/{}", self.base_url, site_id, policy_id)
    }

    /// Send one request; `Ok(None)` for 204 or an empty body
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&PolicyPayload<'_>>,
    ) -> Result<Option<T>> {
        tracing::debug!("{} {} query={:?}", method, url, query);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("X-API-KEY", &self.api_key)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("UniFi API connection error for {} {}: {}", method, url, e),
            )
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("UniFi API {} for {} {}: {}", status.as_u16(), method, url, snippet),
            ));
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })
    }

    async fn write_policy(
        &self,
        method: Method,
        url: &str,
        site_id: &str,
        payload: &PolicyPayload<'_>,
    ) -> Result<ProviderRecord> {
        let policy: DnsPolicy = self
            .request(method.clone(), url, &[], Some(payload))
            .await?
            .ok_or_else(|| {
                Error::provider(
                    PROVIDER_NAME,
                    format!("Empty response body for {} {}", method, url),
                )
            })?;
        Ok(policy.into_record(site_id))
    }
}

#[async_trait]
impl DnsProvider for UnifiProvider {
    /// The API has no lookup by domain, so this lists and filters
    async fn get_record(&self, zone_id: &str, name: &str) -> Result<Option<ProviderRecord>> {
        Ok(self
            .list_records(zone_id)
            .await?
            .into_iter()
            .find(|r| r.name == name))
    }

    async fn create_record(&self, zone_id: &str, name: &str, ip: Ipv4Addr) -> Result<ProviderRecord> {
        let payload = PolicyPayload {
            policy_type: A_RECORD,
            enabled: true,
            domain: name,
            ipv4_address: ip.to_string(),
            ttl_seconds: DEFAULT_TTL,
        };
        self.write_policy(Method::POST, &self.policies_url(zone_id), zone_id, &payload)
            .await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record: &ProviderRecord,
        new_ip: Ipv4Addr,
    ) -> Result<ProviderRecord> {
        let payload = PolicyPayload {
            policy_type: A_RECORD,
            enabled: true,
            domain: &record.name,
            ipv4_address: new_ip.to_string(),
            ttl_seconds: if record.ttl == 0 { DEFAULT_TTL } else { record.ttl },
        };
        self.write_policy(
            Method::PUT,
            &self.policy_url(zone_id, &record.id),
            zone_id,
            &payload,
        )
        .await
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.request::<serde_json::Value>(
            Method::DELETE,
            &self.policy_url(zone_id, record_id),
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ProviderRecord>> {
        let page: Option<PolicyPage> = self
            .request(
                Method::GET,
                &self.policies_url(zone_id),
                &[("limit", LIST_LIMIT), ("offset", "0")],
                None,
            )
            .await?;

        Ok(page
            .map(|p| p.data)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.policy_type == A_RECORD)
            .map(|p| p.into_record(zone_id))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating UniFi providers
pub struct UnifiFactory;

impl DnsProviderFactory for UnifiFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        match config {
            ProviderConfig::Unifi { host, api_key } => {
                Ok(Arc::new(UnifiProvider::new(host, api_key.clone())?))
            }
            _ => Err(Error::config("Invalid config for UniFi provider")),
        }
    }
}

/// Register the UniFi provider with a registry
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider("unifi", Box::new(UnifiFactory));
}
