//! Activity log component
//!
//! Human-readable record of what the reconciliation core did. Every entry is
//! mirrored to `tracing` at the matching level, then appended to the
//! [`LogStore`]. A store failure is traced and swallowed so logging can never
//! abort a cycle.
//!
//! The component also owns the "last cleanup" clock that limits retention
//! cleanup to once per 24 hours. The clock starts as "never run" and lives
//! here rather than in a global so tests can reset it.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::traits::{LogEntry, LogLevel, LogStore};

/// Default number of entries returned by queries
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Default retention for the periodic cleanup, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Minimum spacing between cleanup runs
const CLEANUP_INTERVAL_HOURS: i64 = 24;

pub struct ActivityLog {
    store: Arc<dyn LogStore>,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            last_cleanup: Mutex::new(None),
        }
    }

    /// Append an entry and mirror it to `tracing`
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        if let Err(e) = self.store.append(LogEntry::now(level, message)).await {
            tracing::error!("Failed to persist activity log entry: {}", e);
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message).await;
    }

    /// Newest-first entries
    pub async fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.store.recent(None, limit).await
    }

    /// Newest-first entries of one level
    pub async fn by_level(&self, level: LogLevel, limit: usize) -> Result<Vec<LogEntry>> {
        self.store.recent(Some(level), limit).await
    }

    /// Delete entries older than `days`; zero clears the whole log
    pub async fn delete_older_than(&self, days: u32) -> Result<usize> {
        let cutoff = if days == 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            Utc::now() - Duration::days(i64::from(days))
        };
        self.store.delete_before(cutoff).await
    }

    /// Remove every entry
    pub async fn clear(&self) -> Result<usize> {
        self.delete_older_than(0).await
    }

    /// Retention cleanup, at most once per 24 hours.
    ///
    /// Returns `Ok(None)` when skipped because the last run was too recent.
    pub async fn run_cleanup_if_due(&self, days_to_keep: u32) -> Result<Option<usize>> {
        let mut last = self.last_cleanup.lock().await;
        let now = Utc::now();
        if let Some(at) = *last
            && now - at < Duration::hours(CLEANUP_INTERVAL_HOURS)
        {
            tracing::debug!("Log cleanup not due yet (last run {})", at);
            return Ok(None);
        }

        let removed = self.delete_older_than(days_to_keep).await?;
        *last = Some(now);
        tracing::info!(
            "Log cleanup: deleted {} entr{} older than {} days",
            removed,
            if removed == 1 { "y" } else { "ies" },
            days_to_keep
        );
        Ok(Some(removed))
    }

    /// When the last cleanup ran, if ever
    pub async fn last_cleanup(&self) -> Option<DateTime<Utc>> {
        *self.last_cleanup.lock().await
    }

    /// Forget the last cleanup time so the next call runs immediately
    pub async fn reset_cleanup_clock(&self) {
        *self.last_cleanup.lock().await = None;
    }
}
