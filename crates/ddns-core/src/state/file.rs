// # JSON Document Storage
//
// Persistent backing for the stores in this module, with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: JSON parse failures on load
// - Automatic backup: Keeps .backup of last known good document
// - Recovery: Falls back to backup if corruption detected
//
// ## Commit Model
//
// Every mutation is applied to a copy, written to disk, and only then made
// visible. A failed write leaves both the file and the in-memory value
// untouched, so each operation commits on its own.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": { ... }
// }
// ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;

/// Document format version
/// Used for future migration if format changes
const DOCUMENT_VERSION: &str = "1.0";

#[derive(Serialize)]
struct DocumentOut<'a, T> {
    version: &'a str,
    data: &'a T,
}

#[derive(serde::Deserialize)]
struct DocumentIn<T> {
    version: String,
    data: T,
}

/// A typed value mirrored to a JSON file.
///
/// Without a path the document lives only in memory, which is what the
/// tests and throwaway setups use.
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: Option<PathBuf>,
    data: RwLock<T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Memory-only document starting from `T::default()`
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(T::default()),
        }
    }

    /// Create or load a file-backed document
    ///
    /// This will:
    /// 1. Try to load the existing file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start from `T::default()`
    /// 4. Create parent directories if needed
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let data = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the backing file exists on disk
    pub fn is_persisted(&self) -> bool {
        self.path.as_deref().is_some_and(Path::exists)
    }

    /// Read the current value
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.data.read().await;
        f(&guard)
    }

    /// Mutate, persist, then publish
    pub async fn update<R, F>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        self.write(&next).await?;
        *guard = next;
        Ok(out)
    }

    /// Re-read the backing file, picking up edits made outside the process
    pub async fn reload(&self) -> Result<(), Error> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let data = Self::load_with_recovery(path).await?;
        *self.data.write().await = data;
        Ok(())
    }

    async fn load_with_recovery(path: &Path) -> Result<T, Error> {
        match Self::load(path).await {
            Ok(data) => Ok(data),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(T::default());
                }

                match Self::load(&backup_path).await {
                    Ok(data) => {
                        tracing::info!("Recovered state from backup {}", backup_path.display());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(data)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(T::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<T, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(T::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;

        let document: DocumentIn<T> = serde_json::from_str(&content)?;

        if document.version != DOCUMENT_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                DOCUMENT_VERSION,
                document.version
            );
        }

        Ok(document.data)
    }

    async fn write(&self, data: &T) -> Result<(), Error> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&DocumentOut {
            version: DOCUMENT_VERSION,
            data,
        })?;

        let temp_path = Self::temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if path.exists()
            && let Err(e) = fs::copy(path, Self::backup_path(path)).await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", path.display());
        Ok(())
    }

    fn temp_path(path: &Path) -> PathBuf {
        path.with_extension("tmp")
    }

    pub(crate) fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }
}
