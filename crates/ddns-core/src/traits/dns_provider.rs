// # DNS Provider Trait
//
// Capability interface every DNS backend implements: get/create/update/
// delete/list IPv4 A records by zone (or site) and name.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate (zone = Cloudflare zone id)
// - UniFi: `ddns-provider-unifi` crate (zone = controller site id)
//
// The engine is written once against this trait and runs the same
// reconciliation rules against both backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Live state of one A record as reported by a provider.
///
/// Produced fresh by each provider call and never cached across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Provider-assigned record id
    pub id: String,
    /// Record name
    pub name: String,
    /// Current content (an IPv4 address for A records)
    pub content: String,
    /// Time-to-live in seconds (1 means "automatic" on Cloudflare)
    pub ttl: u32,
    /// Proxied through the provider's edge (public provider only)
    pub proxied: bool,
    /// Zone or site the record lives in
    pub zone_id: String,
}

impl ProviderRecord {
    /// Whether the record already points at `ip`
    pub fn points_to(&self, ip: Ipv4Addr) -> bool {
        self.content.trim() == ip.to_string()
    }
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Providers perform single-shot API calls with their own timeout. They do
///   not retry, cache, or decide whether an update is needed.
/// - Every failure (transport error, non-2xx, API failure envelope) is an
///   [`Error::Provider`](crate::Error::Provider).
/// - "Not found" is not a failure for [`get_record`](DnsProvider::get_record).
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Exact-name lookup of an A record; `Ok(None)` when it does not exist
    async fn get_record(&self, zone_id: &str, name: &str) -> Result<Option<ProviderRecord>>;

    /// Create an A record pointing at `ip`
    async fn create_record(&self, zone_id: &str, name: &str, ip: Ipv4Addr) -> Result<ProviderRecord>;

    /// Point an existing record at `new_ip`, keeping its other attributes
    async fn update_record(
        &self,
        zone_id: &str,
        record: &ProviderRecord,
        new_ip: Ipv4Addr,
    ) -> Result<ProviderRecord>;

    /// Delete a record by provider id
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()>;

    /// All A records in a zone
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ProviderRecord>>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_to_compares_textual_content() {
        let record = ProviderRecord {
            id: "rec1".into(),
            name: "home.example.com".into(),
            content: "1.1.1.1".into(),
            ttl: 1,
            proxied: false,
            zone_id: "zone1".into(),
        };
        assert!(record.points_to(Ipv4Addr::new(1, 1, 1, 1)));
        assert!(!record.points_to(Ipv4Addr::new(9, 9, 9, 9)));
    }
}
