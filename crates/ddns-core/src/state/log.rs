// # JSON Lines Activity Log
//
// One JSON object per line, appended as entries arrive. Cleanup rewrites the
// surviving entries to a temp file and renames it over the original.
// Lines that fail to parse on load are skipped with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::traits::{LogEntry, LogLevel, LogStore};

/// Append-only log store
#[derive(Debug)]
pub struct JsonLinesLogStore {
    path: Option<PathBuf>,
    entries: RwLock<Vec<LogEntry>>,
}

impl JsonLinesLogStore {
    /// Open (or create) the log at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let entries = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            parse_lines(&content, &path)
        } else {
            Vec::new()
        };

        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// Memory-only log
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    async fn rewrite(path: &Path, entries: &[LogEntry]) -> Result<()> {
        let mut body = String::new();
        for entry in entries {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, body.as_bytes()).await.map_err(|e| {
            Error::state_store(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::state_store(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<LogEntry> {
    let mut skipped = 0usize;
    let entries: Vec<LogEntry> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        tracing::warn!("Skipped {} unreadable line(s) in {}", skipped, path.display());
    }
    entries
}

#[async_trait]
impl LogStore for JsonLinesLogStore {
    async fn append(&self, entry: LogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }
        entries.push(entry);
        Ok(())
    }

    async fn recent(&self, level: Option<LogLevel>, limit: usize) -> Result<Vec<LogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| level.is_none_or(|l| e.level == l))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let kept: Vec<LogEntry> = entries
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();
        let removed = entries.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        if let Some(path) = &self.path {
            Self::rewrite(path, &kept).await?;
        }
        *entries = kept;
        Ok(removed)
    }
}
