//! Atomic JSON file operations.
//!
//! Provides a thin layer for safe access to a single JSON file: tmp file +
//! fsync + atomic rename for writes, an exclusive file lock around
//! read-modify-write sequences.

use crate::error::{HarvestError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A handle to an atomically updated JSON file.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// A missing or empty file is `Ok(None)`; unreadable or unparsable
    /// content is an error for the caller to translate.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data: T = serde_json::from_str(&content)?;
        Ok(Some(data))
    }

    /// Saves data atomically: serialize, write to a tmp file in the same
    /// directory, fsync, rename over the target. A failure at any step
    /// leaves the previous file content untouched.
    pub fn save(&self, data: &T) -> Result<()> {
        self.ensure_parent()?;
        let _lock = self.acquire_lock()?;
        self.write_locked(data)
    }

    /// Performs a read-modify-write with the file lock held across the
    /// whole sequence, so no other writer can interleave between the
    /// load and the save.
    ///
    /// A missing file starts from `default_value`; so does unparsable
    /// content (the caller's corrupt-data policy is fallback, and the
    /// write replaces the broken payload).
    pub fn update<F>(&self, default_value: T, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        self.ensure_parent()?;
        let _lock = self.acquire_lock()?;

        let mut data = match self.load() {
            Ok(Some(data)) => data,
            Ok(None) => default_value,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unparsable content, updating from default");
                default_value
            }
        };
        f(&mut data);
        self.write_locked(&data)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Serializes and renames into place. Caller holds the lock.
    fn write_locked(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        if let Err(e) = tmp_file
            .write_all(json.as_bytes())
            .and_then(|_| tmp_file.sync_all())
        {
            drop(tmp_file);
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Removes the file. Idempotent: an absent file is success.
    pub fn remove(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| HarvestError::io("path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| HarvestError::io("path has no file name"))?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(parent.join(tmp_name))
    }

    fn acquire_lock(&self) -> Result<FileLock> {
        FileLock::acquire(&self.path)
    }
}

/// A file lock guard that releases the lock when dropped.
///
/// The lock file itself is never unlinked: removing it while another
/// writer waits on the flock would leave that writer holding an orphaned
/// inode while the next one locks a fresh file at the same path.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| HarvestError::io(format!("failed to acquire lock: {e}")))?;
        }

        Ok(FileLock { _file: file })
    }
}
