// # Hostname Discovery Trait
//
// Read-only sources of candidate hostnames (e.g. Kubernetes Ingress rules).
// Discovery never changes DNS; it only suggests names to manage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A hostname found by a discovery source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub hostname: String,
    /// Namespace (or equivalent grouping) of the source object
    pub namespace: String,
    /// Name of the object that declared the hostname
    pub source_name: String,
}

/// Trait for hostname discovery implementations
#[async_trait]
pub trait HostnameDiscovery: Send + Sync {
    /// All hostnames currently declared by the source
    async fn discover(&self) -> Result<Vec<DiscoveredHost>>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
