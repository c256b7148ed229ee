//! Plugin-based provider registry
//!
//! The registry allows DNS providers to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains. The check cycle asks it for
//! fresh provider instances built from the current configuration.
//!
//! ## Registration
//!
//! Provider crates expose a `register` function:
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! ddns_provider_cloudflare::register(&registry);
//! ddns_provider_unifi::register(&registry);
//!
//! let provider = registry.create_provider(&ProviderConfig::Cloudflare { api_token })?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Provider registry for plugin-based DNS provider creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under a type name (e.g. "cloudflare")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// Fails with [`Error::Config`] when the type is not registered or the
    /// configuration is incomplete.
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        config.validate()?;
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
            Err(Error::config("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("cloudflare"));

        registry.register_provider("cloudflare", Box::new(MockProviderFactory));

        assert!(registry.has_provider("cloudflare"));
        assert_eq!(registry.list_providers(), vec!["cloudflare".to_string()]);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let result = registry.create_provider(&ProviderConfig::Unifi {
            host: "192.168.1.1".into(),
            api_key: "key".into(),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_config_rejected_before_factory() {
        let registry = ProviderRegistry::new();
        registry.register_provider("cloudflare", Box::new(MockProviderFactory));
        let result = registry.create_provider(&ProviderConfig::Cloudflare {
            api_token: String::new(),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
