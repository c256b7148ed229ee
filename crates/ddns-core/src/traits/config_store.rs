// # Configuration Store Traits
//
// Read/write contracts for the singleton GlobalConfig and the optional
// per-name Policy rows.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::{GlobalConfig, Policy};
use crate::error::Result;

/// Storage for the singleton [`GlobalConfig`]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current configuration; created with defaults and persisted on first access
    async fn load(&self) -> Result<GlobalConfig>;

    /// Replace the stored configuration
    async fn save(&self, config: &GlobalConfig) -> Result<()>;
}

/// Storage for per-name [`Policy`] overrides
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Saved policy, or a non-persisted default
    async fn get(&self, name: &str) -> Result<Policy>;

    /// Policies for every name in `names`, defaults filled in
    async fn get_all(&self, names: &[String]) -> Result<HashMap<String, Policy>>;

    /// Insert or replace the policy for `policy.name`
    async fn save(&self, policy: &Policy) -> Result<()>;

    /// Remove a saved policy; a no-op for unknown names
    async fn delete(&self, name: &str) -> Result<()>;
}
