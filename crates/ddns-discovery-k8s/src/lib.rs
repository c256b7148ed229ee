// # Kubernetes Ingress Discovery
//
// Suggests hostnames to manage by reading `networking.k8s.io/v1` Ingress
// objects across all namespaces. Read-only: nothing in the cluster or in
// DNS is changed.
//
// Credentials: the in-cluster service account is tried first, then a
// kubeconfig file (default `/config/kubeconfig`).

use async_trait::async_trait;
use ddns_core::traits::{DiscoveredHost, HostnameDiscovery};
use ddns_core::{Error, Result};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;

/// Kubeconfig used when no service account is mounted
pub const DEFAULT_KUBECONFIG_PATH: &str = "/config/kubeconfig";

const DEFAULT_NAMESPACE: &str = "default";

/// Hostname discovery backed by Ingress rules
#[derive(Debug, Clone)]
pub struct IngressDiscovery {
    enabled: bool,
    kubeconfig_path: PathBuf,
}

impl IngressDiscovery {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            kubeconfig_path: PathBuf::from(DEFAULT_KUBECONFIG_PATH),
        }
    }

    pub fn with_kubeconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig_path = path.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn client(&self) -> Result<Client> {
        let config = match Config::incluster() {
            Ok(config) => {
                tracing::debug!("Kubernetes: using in-cluster service account");
                config
            }
            Err(incluster_err) => {
                tracing::debug!("No in-cluster credentials ({}), trying kubeconfig", incluster_err);
                let kubeconfig = Kubeconfig::read_from(&self.kubeconfig_path).map_err(|e| {
                    Error::discovery(format!(
                        "Could not load cluster credentials: no in-cluster service account and no kubeconfig at '{}': {}",
                        self.kubeconfig_path.display(),
                        e
                    ))
                })?;
                let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| Error::discovery(format!("Invalid kubeconfig: {}", e)))?;
                tracing::debug!("Kubernetes: using kubeconfig at {}", self.kubeconfig_path.display());
                config
            }
        };

        Client::try_from(config)
            .map_err(|e| Error::discovery(format!("Failed to connect to Kubernetes cluster: {}", e)))
    }
}

/// One entry per Ingress rule that names an explicit host
pub fn hosts_from_ingresses(ingresses: &[Ingress]) -> Vec<DiscoveredHost> {
    let mut hosts = Vec::new();
    for ingress in ingresses {
        let namespace = ingress
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let name = ingress.metadata.name.clone().unwrap_or_default();

        let rules = ingress.spec.as_ref().and_then(|s| s.rules.as_ref());
        for rule in rules.into_iter().flatten() {
            if let Some(host) = rule.host.as_deref()
                && !host.is_empty()
            {
                hosts.push(DiscoveredHost {
                    hostname: host.to_string(),
                    namespace: namespace.clone(),
                    source_name: name.clone(),
                });
            }
        }
    }
    hosts
}

#[async_trait]
impl HostnameDiscovery for IngressDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredHost>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let client = self.client().await?;
        let api: Api<Ingress> = Api::all(client);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::discovery(format!("Kubernetes API error: {}", e)))?;

        let hosts = hosts_from_ingresses(&list.items);
        tracing::info!(
            "Kubernetes ingress discovery: found {} hostname(s) across {} ingress resource(s)",
            hosts.len(),
            list.items.len()
        );
        Ok(hosts)
    }

    fn source_name(&self) -> &'static str {
        "kubernetes"
    }
}
