//! Management operations
//!
//! The user-facing actions a dashboard or CLI performs on the managed set:
//! adding and removing names, editing policies and settings, and direct
//! record actions against the public provider. Every mutation that the
//! user would want to see afterwards lands in the activity log.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::activity::ActivityLog;
use crate::config::{GlobalConfig, Policy, validate_hostname};
use crate::engine::DdnsEngine;
use crate::error::{Error, Result};
use crate::registry::ProviderRegistry;
use crate::scheduler::SchedulerControl;
use crate::traits::{
    ConfigStore, DiscoveredHost, HostnameDiscovery, IpSource, LogEntry, LogLevel, PolicyStore,
    ProviderRecord, RecordStats, StatsStore,
};

pub struct ManagementService {
    config_store: Arc<dyn ConfigStore>,
    policy_store: Arc<dyn PolicyStore>,
    stats: Arc<dyn StatsStore>,
    activity: Arc<ActivityLog>,
    registry: Arc<ProviderRegistry>,
    ip_source: Arc<dyn IpSource>,
    scheduler: Option<SchedulerControl>,
    discovery: Option<Arc<dyn HostnameDiscovery>>,
}

impl ManagementService {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        policy_store: Arc<dyn PolicyStore>,
        stats: Arc<dyn StatsStore>,
        activity: Arc<ActivityLog>,
        registry: Arc<ProviderRegistry>,
        ip_source: Arc<dyn IpSource>,
    ) -> Self {
        Self {
            config_store,
            policy_store,
            stats,
            activity,
            registry,
            ip_source,
            scheduler: None,
            discovery: None,
        }
    }

    /// Attach the running scheduler so interval edits take effect live
    pub fn with_scheduler(mut self, control: SchedulerControl) -> Self {
        self.scheduler = Some(control);
        self
    }

    /// Attach a hostname discovery source
    pub fn with_discovery(mut self, discovery: Arc<dyn HostnameDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub async fn config(&self) -> Result<GlobalConfig> {
        self.config_store.load().await
    }

    pub async fn policy(&self, name: &str) -> Result<Policy> {
        self.policy_store.get(name).await
    }

    pub async fn record_stats(&self) -> Result<Vec<RecordStats>> {
        self.stats.get_all().await
    }

    pub async fn recent_activity(
        &self,
        level: Option<LogLevel>,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        match level {
            Some(level) => self.activity.by_level(level, limit).await,
            None => self.activity.recent(limit).await,
        }
    }

    /// Start managing `name`, stored verbatim. Returns `false` if it was
    /// already managed.
    pub async fn add_managed_name(&self, name: &str) -> Result<bool> {
        validate_hostname(name)?;

        let mut config = self.config_store.load().await?;
        if !config.add_record(name) {
            debug!("{} is already managed", name);
            return Ok(false);
        }
        self.config_store.save(&config).await?;
        self.activity.info(format!("Added {} to managed records.", name)).await;
        Ok(true)
    }

    /// Stop managing `name` and drop its stats row and policy.
    ///
    /// Returns `false` if the name was not managed; the cascade runs anyway
    /// so stray rows are cleaned up.
    pub async fn remove_managed_name(&self, name: &str) -> Result<bool> {
        let mut config = self.config_store.load().await?;
        let removed = config.remove_record(name);
        if removed {
            self.config_store.save(&config).await?;
        }

        self.stats.delete_for_name(name).await?;
        self.policy_store.delete(name).await?;

        if removed {
            self.activity
                .info(format!("Removed {} from managed records.", name))
                .await;
        }
        Ok(removed)
    }

    pub async fn save_policy(&self, policy: Policy) -> Result<()> {
        validate_hostname(&policy.name)?;
        self.policy_store.save(&policy).await?;
        self.activity
            .info(format!("Updated config for '{}': {}", policy.name, policy.summary()))
            .await;
        Ok(())
    }

    pub async fn reset_failures(&self, name: &str) -> Result<()> {
        self.stats.reset_failures(name).await?;
        self.activity
            .info(format!("Reset failure count for {}.", name))
            .await;
        Ok(())
    }

    /// Delete every activity log entry; returns how many were removed
    pub async fn clear_logs(&self) -> Result<usize> {
        let removed = self.activity.clear().await?;
        self.activity.info("Logs cleared.").await;
        Ok(removed)
    }

    /// Validate and persist new settings.
    ///
    /// A changed check interval is pushed to the attached scheduler.
    pub async fn update_settings(&self, config: GlobalConfig) -> Result<()> {
        config.validate()?;
        let previous = self.config_store.load().await?;
        self.config_store.save(&config).await?;

        if previous.interval_secs != config.interval_secs
            && let Some(scheduler) = &self.scheduler
        {
            scheduler.reschedule(Duration::from_secs(config.interval_secs))?;
        }

        self.activity.info("Configuration updated.").await;
        Ok(())
    }

    /// Ask the scheduler for an immediate check cycle
    pub fn trigger_check(&self) -> Result<()> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or_else(|| Error::config("No scheduler attached"))?;
        scheduler.trigger_now();
        Ok(())
    }

    /// Live public record for `name`; `None` when no zone covers it or the
    /// record does not exist
    pub async fn check_record(&self, name: &str) -> Result<Option<ProviderRecord>> {
        let (engine, config) = self.public_engine().await?;
        engine.check_single_record(name, &config.zones).await
    }

    /// Every A record across the configured zones
    pub async fn list_zone_records(&self) -> Result<Vec<ProviderRecord>> {
        let (engine, config) = self.public_engine().await?;
        engine.list_zone_records(&config.zones).await
    }

    /// Create a public record and start managing its name
    pub async fn create_and_manage(&self, name: &str, ip: Ipv4Addr) -> Result<ProviderRecord> {
        validate_hostname(name)?;
        let (engine, config) = self.public_engine().await?;
        let record = engine.create_record(name, ip, &config.zones).await?;
        self.add_managed_name(name).await?;
        Ok(record)
    }

    /// Delete a public record and stop managing its name
    pub async fn delete_and_unmanage(&self, record_id: &str, name: &str) -> Result<()> {
        let (engine, config) = self.public_engine().await?;
        engine.delete_record(record_id, name, &config.zones).await?;
        self.remove_managed_name(name).await?;
        Ok(())
    }

    /// Discovered hostnames that are not managed yet, one entry per hostname.
    ///
    /// Empty when discovery is disabled in settings or no source is attached.
    pub async fn discover_unmanaged(&self) -> Result<Vec<DiscoveredHost>> {
        let config = self.config_store.load().await?;
        let Some(discovery) = self.discovery.as_ref().filter(|_| config.k8s_enabled) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let hosts = discovery
            .discover()
            .await?
            .into_iter()
            .filter(|host| !config.is_managed(&host.hostname))
            .filter(|host| seen.insert(host.hostname.clone()))
            .collect::<Vec<_>>();

        debug!(
            "{} discovery found {} unmanaged hostname(s)",
            discovery.source_name(),
            hosts.len()
        );
        Ok(hosts)
    }

    async fn public_engine(&self) -> Result<(DdnsEngine, GlobalConfig)> {
        let config = self.config_store.load().await?;
        let provider_config = config
            .public_provider()
            .ok_or_else(|| Error::config("No API token configured"))?;
        let provider = self.registry.create_provider(&provider_config)?;
        let engine = DdnsEngine::new(
            provider,
            self.ip_source.clone(),
            self.stats.clone(),
            self.activity.clone(),
        );
        Ok((engine, config))
    }
}
