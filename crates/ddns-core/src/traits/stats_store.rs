// # Stats Store Trait
//
// Per-name outcome ledger: check/update timestamps plus update and failure
// counters.
//
// Every mutating call is get-or-create then persist, committed on its own.
// A name with no row yet is materialized with zero counters on first touch.
// Nothing ever decrements `update_count`; `reset_failures` is the only
// counter-clearing path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outcome counters for one managed name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    pub name: String,
    /// Last time provider state was read successfully
    pub last_checked: Option<DateTime<Utc>>,
    /// Last successful update
    pub last_updated: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub failure_count: u64,
}

impl RecordStats {
    /// Zero-valued row for a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_checked: None,
            last_updated: None,
            update_count: 0,
            failure_count: 0,
        }
    }

    pub(crate) fn mark_checked(&mut self, at: DateTime<Utc>) {
        self.last_checked = Some(at);
    }

    pub(crate) fn mark_updated(&mut self, at: DateTime<Utc>) {
        self.update_count = self.update_count.saturating_add(1);
        self.last_updated = Some(at);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
    }
}

/// Trait for stats ledger implementations
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Stamp `last_checked`
    async fn record_checked(&self, name: &str) -> Result<()>;

    /// Increment `update_count` and stamp `last_updated`
    async fn record_updated(&self, name: &str) -> Result<()>;

    /// Increment `failure_count`
    async fn record_failed(&self, name: &str) -> Result<()>;

    /// Clear `failure_count` (user action)
    async fn reset_failures(&self, name: &str) -> Result<()>;

    /// Remove the row entirely; a no-op for unknown names
    async fn delete_for_name(&self, name: &str) -> Result<()>;

    /// All rows ordered by name
    async fn get_all(&self) -> Result<Vec<RecordStats>>;

    /// The row for one name, if it exists
    async fn get_for_name(&self, name: &str) -> Result<Option<RecordStats>>;
}
