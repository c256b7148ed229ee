// # Log Store Trait
//
// Append-only storage behind the activity log. Entries are never edited or
// removed individually; only time-bounded bulk deletion exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Severity of an activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(Error::invalid_input(format!("Unknown log level: {}", other))),
        }
    }
}

/// One human-readable activity log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Entry stamped with the current time
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Trait for activity log storage
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one entry
    async fn append(&self, entry: LogEntry) -> Result<()>;

    /// Newest-first entries, optionally filtered by level
    async fn recent(&self, level: Option<LogLevel>, limit: usize) -> Result<Vec<LogEntry>>;

    /// Delete entries strictly older than `cutoff`; returns how many went
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
