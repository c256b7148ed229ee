//! Reconciliation engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving the public IP once per cycle
//! - Choosing each managed name's target IP from its policy
//! - Comparing against the provider's live record and updating on drift
//! - Classifying every name's outcome into the stats ledger and activity log
//!
//! ## Cycle Flow
//!
//! ```text
//!            ┌─────────────┐
//!            │  IpSource   │  once per cycle
//!            └──────┬──────┘
//!                   ▼
//! names ──► ┌──────────────┐ ──► get_record / update_record ──► DnsProvider
//!           │  DdnsEngine  │
//!           └──────┬───────┘
//!                  ▼
//!        StatsStore + ActivityLog   (one commit per outcome)
//! ```
//!
//! Names are processed sequentially. Provider errors are contained per name;
//! the only cycle-level failure is an IP resolution error while some active
//! name still needs the dynamic IP.

pub mod cycle;
pub mod local;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, error};

use crate::activity::ActivityLog;
use crate::config::{Policy, ZoneMap};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpSource, ProviderRecord, StatsStore};
use crate::zone::{base_domain, resolve_zone_id};

pub use cycle::{CheckCycle, CycleReport};
pub use local::{LocalOutcome, LocalSync, LocalTally};

/// Terminal state of one name in a public-provider pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Record already matched the target
    Unchanged,
    /// Record was pointed at the target
    Updated,
    /// Zone missing, record missing, or provider error
    Failed,
    /// Provider disabled for the name, or no target IP available
    Skipped,
}

/// Per-classification counts for one public-provider pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Names that reached zone resolution
    pub checked: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
    /// The pass stopped before touching any name
    pub aborted: bool,
}

impl CycleSummary {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => {
                self.skipped += 1;
                return;
            }
        }
        self.checked += 1;
    }
}

/// Core reconciliation engine for one DNS provider
pub struct DdnsEngine {
    provider: Arc<dyn DnsProvider>,
    ip_source: Arc<dyn IpSource>,
    stats: Arc<dyn StatsStore>,
    activity: Arc<ActivityLog>,
}

impl DdnsEngine {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        ip_source: Arc<dyn IpSource>,
        stats: Arc<dyn StatsStore>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            provider,
            ip_source,
            stats,
            activity,
        }
    }

    /// Run one public-provider pass over `names`.
    ///
    /// Never fails as a whole: every outcome lands in the stats ledger and
    /// the activity log. The returned summary is for callers that want the
    /// counts without re-reading the log.
    pub async fn run_check_cycle(
        &self,
        names: &[String],
        zones: &ZoneMap,
        policies: &HashMap<String, Policy>,
    ) -> CycleSummary {
        if names.is_empty() {
            debug!("No managed records, nothing to check");
            return CycleSummary::default();
        }

        let policy_for = |name: &str| {
            policies
                .get(name)
                .cloned()
                .unwrap_or_else(|| Policy::default_for(name))
        };

        let public_ip = match self.ip_source.current().await {
            Ok(ip) => Some(ip),
            Err(e) => {
                if names.iter().any(|n| policy_for(n.as_str()).needs_dynamic_ip()) {
                    self.activity
                        .error(format!("Could not fetch public IP: {}", e.detail()))
                        .await;
                    return CycleSummary::aborted();
                }
                self.activity
                    .warn(format!(
                        "Could not fetch public IP: {}. Continuing with static IPs only.",
                        e.detail()
                    ))
                    .await;
                None
            }
        };

        self.activity
            .info(format!(
                "Check cycle started. Current public IP: {}",
                public_ip.map_or_else(|| "N/A (static mode)".to_string(), |ip| ip.to_string())
            ))
            .await;

        let mut summary = CycleSummary::default();
        for name in names {
            let policy = policy_for(name.as_str());
            let outcome = self.reconcile_name(name, &policy, public_ip, zones).await;
            debug!(record = %name, ?outcome, "Record reconciled");
            summary.record(outcome);
        }

        self.activity.info(self.summary_line(&summary)).await;

        summary
    }

    fn summary_line(&self, summary: &CycleSummary) -> String {
        let provider = self.provider.provider_name();
        let mut parts = vec![format!("{} record(s) checked via {}", summary.checked, provider)];
        if summary.skipped > 0 {
            parts.push(format!("{} skipped", summary.skipped));
        }
        if summary.updated > 0 {
            parts.push(format!("{} updated", summary.updated));
        }
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed));
        }
        format!("{} pass: {}.", provider, parts.join(", "))
    }

    async fn reconcile_name(
        &self,
        name: &str,
        policy: &Policy,
        public_ip: Option<Ipv4Addr>,
        zones: &ZoneMap,
    ) -> Outcome {
        if !policy.public_enabled {
            debug!("Public DNS disabled for {}, skipping", name);
            return Outcome::Skipped;
        }

        let Some(target) = policy.static_override().or(public_ip) else {
            self.activity
                .warn(format!(
                    "Skipped {}: public IP unavailable and no static IP configured.",
                    name
                ))
                .await;
            return Outcome::Skipped;
        };

        let Some(zone_id) = resolve_zone_id(name, zones) else {
            self.activity
                .warn(format!(
                    "No zone configured for {} (base domain {}), skipping.",
                    name,
                    base_domain(name).unwrap_or(name)
                ))
                .await;
            self.commit(self.stats.record_failed(name).await);
            return Outcome::Failed;
        };

        match self.check_and_update(name, zone_id, target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.activity
                    .error(format!("Failed to update {}: {}", name, e.detail()))
                    .await;
                self.commit(self.stats.record_failed(name).await);
                Outcome::Failed
            }
        }
    }

    async fn check_and_update(&self, name: &str, zone_id: &str, target: Ipv4Addr) -> Result<Outcome> {
        let record = self.provider.get_record(zone_id, name).await?;
        self.commit(self.stats.record_checked(name).await);

        let Some(record) = record else {
            self.activity
                .warn(format!("Record {} not found in zone {}.", name, zone_id))
                .await;
            self.commit(self.stats.record_failed(name).await);
            return Ok(Outcome::Failed);
        };

        if record.points_to(target) {
            self.activity
                .info(format!("{} is already up to date ({}).", name, target))
                .await;
            return Ok(Outcome::Unchanged);
        }

        self.provider.update_record(zone_id, &record, target).await?;
        self.commit(self.stats.record_updated(name).await);
        self.activity
            .info(format!("Updated {}: {} -> {}", name, record.content, target))
            .await;
        Ok(Outcome::Updated)
    }

    /// Live record for one name, for on-demand display. No stats or log writes.
    pub async fn check_single_record(
        &self,
        name: &str,
        zones: &ZoneMap,
    ) -> Result<Option<ProviderRecord>> {
        match resolve_zone_id(name, zones) {
            Some(zone_id) => self.provider.get_record(zone_id, name).await,
            None => Ok(None),
        }
    }

    /// Every record across all configured zones.
    ///
    /// Zones that fail are traced and skipped; the first error is returned
    /// only when every zone failed.
    pub async fn list_zone_records(&self, zones: &ZoneMap) -> Result<Vec<ProviderRecord>> {
        let mut records = Vec::new();
        let mut first_error = None;
        let mut any_ok = false;

        for (domain, zone_id) in zones.iter() {
            match self.provider.list_records(zone_id).await {
                Ok(mut zone_records) => {
                    any_ok = true;
                    records.append(&mut zone_records);
                }
                Err(e) => {
                    tracing::warn!("Failed to list records for {}: {}", domain, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(records),
        }
    }

    /// Create a record for `name` (user action). Provider errors propagate.
    pub async fn create_record(
        &self,
        name: &str,
        ip: Ipv4Addr,
        zones: &ZoneMap,
    ) -> Result<ProviderRecord> {
        let zone_id = Self::require_zone(name, zones)?;
        match self.provider.create_record(zone_id, name, ip).await {
            Ok(record) => {
                self.activity
                    .info(format!("Created DNS record {} -> {}", name, ip))
                    .await;
                Ok(record)
            }
            Err(e) => {
                self.activity
                    .error(format!("Failed to create DNS record {}: {}", name, e.detail()))
                    .await;
                Err(e)
            }
        }
    }

    /// Delete a record (user action) and drop the name's stats row.
    pub async fn delete_record(&self, record_id: &str, name: &str, zones: &ZoneMap) -> Result<()> {
        let zone_id = Self::require_zone(name, zones)?;
        if let Err(e) = self.provider.delete_record(zone_id, record_id).await {
            self.activity
                .error(format!("Failed to delete DNS record {}: {}", name, e.detail()))
                .await;
            return Err(e);
        }
        self.stats.delete_for_name(name).await?;
        self.activity.info(format!("Deleted DNS record {}", name)).await;
        Ok(())
    }

    fn require_zone<'a>(name: &str, zones: &'a ZoneMap) -> Result<&'a str> {
        resolve_zone_id(name, zones).ok_or_else(|| {
            Error::config(format!(
                "No zone configured for {} (base domain {})",
                name,
                base_domain(name).unwrap_or(name)
            ))
        })
    }

    fn commit(&self, result: Result<()>) {
        if let Err(e) = result {
            error!("Failed to write stats: {}", e);
        }
    }
}
