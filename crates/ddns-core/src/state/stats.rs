//! JSON-backed stats ledger

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

use super::file::JsonDocument;
use crate::error::Result;
use crate::traits::{RecordStats, StatsStore};

/// Stats ledger stored as one JSON document keyed by name
#[derive(Debug)]
pub struct JsonStatsStore {
    doc: JsonDocument<BTreeMap<String, RecordStats>>,
}

impl JsonStatsStore {
    /// Open (or create) the ledger at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            doc: JsonDocument::open(path).await?,
        })
    }

    /// Memory-only ledger
    pub fn in_memory() -> Self {
        Self {
            doc: JsonDocument::in_memory(),
        }
    }

    async fn touch<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut RecordStats) + Send,
    {
        self.doc
            .update(|rows| {
                let row = rows
                    .entry(name.to_string())
                    .or_insert_with(|| RecordStats::new(name));
                f(row);
            })
            .await
    }
}

#[async_trait]
impl StatsStore for JsonStatsStore {
    async fn record_checked(&self, name: &str) -> Result<()> {
        let now = Utc::now();
        self.touch(name, |row| row.mark_checked(now)).await
    }

    async fn record_updated(&self, name: &str) -> Result<()> {
        let now = Utc::now();
        self.touch(name, |row| row.mark_updated(now)).await
    }

    async fn record_failed(&self, name: &str) -> Result<()> {
        self.touch(name, RecordStats::mark_failed).await
    }

    async fn reset_failures(&self, name: &str) -> Result<()> {
        self.touch(name, |row| row.failure_count = 0).await
    }

    async fn delete_for_name(&self, name: &str) -> Result<()> {
        if !self.doc.read(|rows| rows.contains_key(name)).await {
            return Ok(());
        }
        self.doc
            .update(|rows| {
                rows.remove(name);
            })
            .await
    }

    async fn get_all(&self) -> Result<Vec<RecordStats>> {
        Ok(self.doc.read(|rows| rows.values().cloned().collect()).await)
    }

    async fn get_for_name(&self, name: &str) -> Result<Option<RecordStats>> {
        Ok(self.doc.read(|rows| rows.get(name).cloned()).await)
    }
}
