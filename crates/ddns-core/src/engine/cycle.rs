//! The scheduled check job
//!
//! Loads the current configuration, builds providers from it, then runs the
//! public pass, the local pass, and the log retention cleanup in that order.
//! Providers are rebuilt on every run so credential edits apply on the next
//! tick without a restart.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::local::{LocalSync, LocalTally};
use super::{CycleSummary, DdnsEngine};
use crate::activity::{ActivityLog, DEFAULT_RETENTION_DAYS};
use crate::error::Result;
use crate::registry::ProviderRegistry;
use crate::scheduler::ScheduledJob;
use crate::traits::{ConfigStore, IpSource, PolicyStore, StatsStore};

/// What one run of [`CheckCycle`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Public pass summary, if it ran
    pub public: Option<CycleSummary>,
    /// Local pass tally, if it ran
    pub local: Option<LocalTally>,
    /// Entries removed by retention cleanup, if it was due
    pub cleaned: Option<usize>,
}

pub struct CheckCycle {
    registry: Arc<ProviderRegistry>,
    config_store: Arc<dyn ConfigStore>,
    policy_store: Arc<dyn PolicyStore>,
    stats: Arc<dyn StatsStore>,
    activity: Arc<ActivityLog>,
    ip_source: Arc<dyn IpSource>,
    retention_days: u32,
}

impl CheckCycle {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config_store: Arc<dyn ConfigStore>,
        policy_store: Arc<dyn PolicyStore>,
        stats: Arc<dyn StatsStore>,
        activity: Arc<ActivityLog>,
        ip_source: Arc<dyn IpSource>,
    ) -> Self {
        Self {
            registry,
            config_store,
            policy_store,
            stats,
            activity,
            ip_source,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Days of activity log kept by the cleanup step
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Run every pass once
    pub async fn run_once(&self) -> Result<CycleReport> {
        let config = self.config_store.load().await?;
        let names = config.records.clone();
        let policies = self.policy_store.get_all(&names).await?;
        let mut report = CycleReport::default();

        match config.public_provider() {
            Some(provider_config) => match self.registry.create_provider(&provider_config) {
                Ok(provider) => {
                    let engine = DdnsEngine::new(
                        provider,
                        self.ip_source.clone(),
                        self.stats.clone(),
                        self.activity.clone(),
                    );
                    report.public =
                        Some(engine.run_check_cycle(&names, &config.zones, &policies).await);
                }
                Err(e) => {
                    self.activity
                        .error(format!(
                            "Could not set up {} provider: {}",
                            provider_config.type_name(),
                            e.detail()
                        ))
                        .await;
                }
            },
            None => warn!("No API token configured, skipping public DNS pass"),
        }

        match config.local_provider() {
            Some(provider_config) if !names.is_empty() => {
                match self.registry.create_provider(&provider_config) {
                    Ok(provider) => {
                        let local = LocalSync::new(
                            provider,
                            config.local.site_id.clone(),
                            config.local.default_ip,
                            self.stats.clone(),
                            self.activity.clone(),
                        );
                        report.local = Some(local.run(&names, &policies).await);
                    }
                    Err(e) => {
                        self.activity
                            .error(format!(
                                "Could not set up {} provider: {}",
                                provider_config.type_name(),
                                e.detail()
                            ))
                            .await;
                    }
                }
            }
            Some(_) => debug!("No managed records, skipping local DNS pass"),
            None => debug!("Local DNS provider disabled or not fully configured"),
        }

        match self.activity.run_cleanup_if_due(self.retention_days).await {
            Ok(cleaned) => report.cleaned = cleaned,
            Err(e) => error!("Log cleanup failed: {}", e),
        }

        Ok(report)
    }
}

#[async_trait]
impl ScheduledJob for CheckCycle {
    async fn run(&self) {
        if let Err(e) = self.run_once().await {
            error!("Check cycle failed: {}", e);
        }
    }
}
