//! JSON-backed configuration and policy stores

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::file::JsonDocument;
use crate::config::{GlobalConfig, Policy};
use crate::error::Result;
use crate::traits::{ConfigStore, PolicyStore};

/// Singleton [`GlobalConfig`] stored as a JSON document
#[derive(Debug)]
pub struct JsonConfigStore {
    doc: JsonDocument<GlobalConfig>,
}

impl JsonConfigStore {
    /// Open the config file, writing the default row if none exists yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let doc = JsonDocument::open(path).await?;
        if !doc.is_persisted() {
            tracing::info!("No configuration found, creating defaults");
            doc.update(|_| ()).await?;
        }
        Ok(Self { doc })
    }

    /// Memory-only store holding the defaults
    pub fn in_memory() -> Self {
        Self {
            doc: JsonDocument::in_memory(),
        }
    }

    /// Re-read `config.json` from disk and return the result
    pub async fn reload(&self) -> Result<GlobalConfig> {
        self.doc.reload().await?;
        self.load().await
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<GlobalConfig> {
        Ok(self.doc.read(GlobalConfig::clone).await)
    }

    async fn save(&self, config: &GlobalConfig) -> Result<()> {
        let config = config.clone();
        self.doc.update(move |current| *current = config).await
    }
}

/// Per-name policies stored as one JSON document keyed by name
#[derive(Debug)]
pub struct JsonPolicyStore {
    doc: JsonDocument<BTreeMap<String, Policy>>,
}

impl JsonPolicyStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            doc: JsonDocument::open(path).await?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            doc: JsonDocument::in_memory(),
        }
    }
}

#[async_trait]
impl PolicyStore for JsonPolicyStore {
    async fn get(&self, name: &str) -> Result<Policy> {
        Ok(self
            .doc
            .read(|rows| rows.get(name).cloned())
            .await
            .unwrap_or_else(|| Policy::default_for(name)))
    }

    async fn get_all(&self, names: &[String]) -> Result<HashMap<String, Policy>> {
        Ok(self
            .doc
            .read(|rows| {
                names
                    .iter()
                    .map(|name| {
                        let policy = rows
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| Policy::default_for(name.as_str()));
                        (name.clone(), policy)
                    })
                    .collect()
            })
            .await)
    }

    async fn save(&self, policy: &Policy) -> Result<()> {
        let policy = policy.clone();
        self.doc
            .update(move |rows| {
                rows.insert(policy.name.clone(), policy);
            })
            .await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        if !self.doc.read(|rows| rows.contains_key(name)).await {
            return Ok(());
        }
        self.doc
            .update(|rows| {
                rows.remove(name);
            })
            .await
    }
}
