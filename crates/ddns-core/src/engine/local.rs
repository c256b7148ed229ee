//! Local network pass (UniFi DNS policies)
//!
//! Runs independently of the public pass. Each managed name gets up to two
//! sub-passes: one for the exact name, and one for its `.local` companion
//! (see [`derive_local_name`]). Disabling a sub-pass deletes the matching
//! policy; enabling it creates or updates one.
//!
//! This pass only stamps `last_checked`. Update and failure counters belong
//! to the public pass.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, error};

use crate::activity::ActivityLog;
use crate::config::Policy;
use crate::error::Result;
use crate::traits::{DnsProvider, StatsStore};
use crate::zone::derive_local_name;

/// Result of one local sub-pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Disabled and nothing to delete
    Absent,
    Failed,
    Skipped,
}

/// Running totals for one local pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl LocalTally {
    fn record(&mut self, outcome: LocalOutcome) {
        match outcome {
            LocalOutcome::Created => self.created += 1,
            LocalOutcome::Updated => self.updated += 1,
            LocalOutcome::Unchanged => self.unchanged += 1,
            LocalOutcome::Deleted => self.deleted += 1,
            LocalOutcome::Failed => self.failed += 1,
            LocalOutcome::Skipped => self.skipped += 1,
            LocalOutcome::Absent => {}
        }
    }
}

/// Reconciles managed names against a local network controller
pub struct LocalSync {
    provider: Arc<dyn DnsProvider>,
    site_id: String,
    default_ip: Option<Ipv4Addr>,
    stats: Arc<dyn StatsStore>,
    activity: Arc<ActivityLog>,
}

impl LocalSync {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        site_id: impl Into<String>,
        default_ip: Option<Ipv4Addr>,
        stats: Arc<dyn StatsStore>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            provider,
            site_id: site_id.into(),
            default_ip,
            stats,
            activity,
        }
    }

    /// Run the local pass over `names` and log one summary line
    pub async fn run(&self, names: &[String], policies: &HashMap<String, Policy>) -> LocalTally {
        let mut tally = LocalTally::default();

        for name in names {
            let policy = policies
                .get(name)
                .cloned()
                .unwrap_or_else(|| Policy::default_for(name.as_str()));

            let primary_target = policy.local_static_ip.or(self.default_ip);
            let (outcome, mut evaluated) = self
                .sync_one(name, policy.local_enabled, primary_target)
                .await;
            tally.record(outcome);

            let companion = derive_local_name(name);
            if companion != *name {
                let companion_target = policy
                    .local_companion_static_ip
                    .or(policy.local_static_ip)
                    .or(self.default_ip);
                let (outcome, companion_evaluated) = self
                    .sync_one(&companion, policy.local_companion_enabled, companion_target)
                    .await;
                tally.record(outcome);
                evaluated |= companion_evaluated;
            }

            if evaluated && let Err(e) = self.stats.record_checked(name).await {
                error!("Failed to write stats for {}: {}", name, e);
            }
        }

        let message = format!(
            "Local DNS pass ({}): {} created, {} updated, {} unchanged, {} deleted, {} failed, {} skipped.",
            self.provider.provider_name(),
            tally.created,
            tally.updated,
            tally.unchanged,
            tally.deleted,
            tally.failed,
            tally.skipped
        );
        if tally.failed > 0 {
            self.activity.warn(message).await;
        } else {
            self.activity.info(message).await;
        }

        tally
    }

    /// One sub-pass. The flag reports whether provider state was read.
    async fn sync_one(
        &self,
        name: &str,
        enabled: bool,
        target: Option<Ipv4Addr>,
    ) -> (LocalOutcome, bool) {
        if enabled && target.is_none() {
            self.activity
                .warn(format!(
                    "Local DNS: skipped {}: no local static IP or default IP configured.",
                    name
                ))
                .await;
            return (LocalOutcome::Skipped, false);
        }

        let existing = match self.provider.get_record(&self.site_id, name).await {
            Ok(existing) => existing,
            Err(e) => {
                self.activity
                    .error(format!("Local DNS: failed to look up {}: {}", name, e.detail()))
                    .await;
                return (LocalOutcome::Failed, false);
            }
        };

        let outcome = match target.filter(|_| enabled) {
            None => self.remove(name, existing.map(|r| r.id)).await,
            Some(ip) => self.apply(name, existing, ip).await,
        };
        match outcome {
            Ok(outcome) => (outcome, true),
            Err(e) => {
                self.activity
                    .error(format!("Local DNS: failed to sync {}: {}", name, e.detail()))
                    .await;
                (LocalOutcome::Failed, true)
            }
        }
    }

    async fn remove(&self, name: &str, existing_id: Option<String>) -> Result<LocalOutcome> {
        let Some(id) = existing_id else {
            debug!("Local DNS disabled for {} and no policy exists", name);
            return Ok(LocalOutcome::Absent);
        };
        self.provider.delete_record(&self.site_id, &id).await?;
        self.activity
            .info(format!("Local DNS: removed policy {} (disabled by user).", name))
            .await;
        Ok(LocalOutcome::Deleted)
    }

    async fn apply(
        &self,
        name: &str,
        existing: Option<crate::traits::ProviderRecord>,
        ip: Ipv4Addr,
    ) -> Result<LocalOutcome> {
        match existing {
            None => {
                self.provider.create_record(&self.site_id, name, ip).await?;
                self.activity
                    .info(format!("Local DNS: created policy {} -> {}.", name, ip))
                    .await;
                Ok(LocalOutcome::Created)
            }
            Some(record) if record.points_to(ip) => {
                debug!("Local DNS policy {} already points to {}", name, ip);
                Ok(LocalOutcome::Unchanged)
            }
            Some(record) => {
                self.provider.update_record(&self.site_id, &record, ip).await?;
                self.activity
                    .info(format!(
                        "Local DNS: updated policy {}: {} -> {}.",
                        name, record.content, ip
                    ))
                    .await;
                Ok(LocalOutcome::Updated)
            }
        }
    }
}
