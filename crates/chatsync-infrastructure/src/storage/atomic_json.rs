//! Atomic JSON file operations.
//!
//! Conversation documents hold heterogeneous message records (including
//! `null` entries), so they are stored as JSON rather than TOML.

use chatsync_core::ChatError;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic JSON operations.
#[derive(Debug)]
pub enum AtomicJsonError {
    /// File I/O error.
    IoError(std::io::Error),
    /// JSON serialization/deserialization error.
    JsonError(serde_json::Error),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicJsonError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicJsonError::JsonError(e) => write!(f, "JSON error: {}", e),
            AtomicJsonError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicJsonError {}

impl From<std::io::Error> for AtomicJsonError {
    fn from(e: std::io::Error) -> Self {
        AtomicJsonError::IoError(e)
    }
}

impl From<serde_json::Error> for AtomicJsonError {
    fn from(e: serde_json::Error) -> Self {
        AtomicJsonError::JsonError(e)
    }
}

impl From<AtomicJsonError> for ChatError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::JsonError(err) => ChatError::from(err),
            other => ChatError::data_access(other.to_string()),
        }
    }
}

/// A handle to a JSON file written atomically.
///
/// - Writes go to a temp file, are fsynced, then renamed over the target
/// - Read-modify-write updates hold an exclusive lock file
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
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
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

    /// Saves data atomically via temp file + rename.
    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Loads, modifies and saves the file under an exclusive lock.
    ///
    /// `committed` sees the saved value before the lock is released, so
    /// concurrent writers observe their commits in write order.
    ///
    /// Returns `Ok(None)` without writing when the file doesn't exist;
    /// otherwise the updated value.
    pub fn update_existing<F, C>(&self, f: F, committed: C) -> Result<Option<T>, AtomicJsonError>
    where
        F: FnOnce(&mut T),
        C: FnOnce(&T),
    {
        let _lock = FileLock::acquire(&self.path)?;

        let Some(mut data) = self.load()? else {
            return Ok(None);
        };

        f(&mut data);
        self.save(&data)?;
        committed(&data);

        Ok(Some(data))
    }

    /// Removes the file under the lock. A missing file is not an error.
    ///
    /// `committed` runs before the lock is released.
    pub fn remove<C>(&self, committed: C) -> Result<(), AtomicJsonError>
    where
        C: FnOnce(),
    {
        let lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        committed();
        lock.release_and_remove();
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicJsonError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock guard; released on drop.
///
/// The lock file outlives the guard so every writer locks the same inode.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicJsonError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| AtomicJsonError::LockError(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl FileLock {
    /// Releases the lock and deletes the lock file.
    ///
    /// Only safe once the guarded file is gone: a waiter may still hold the
    /// unlinked inode while a newcomer locks a fresh one.
    fn release_and_remove(self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("c.json"));

        file.save(&Counter {
            name: "test".to_string(),
            count: 42,
        })
        .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.count, 42);
        assert!(!temp_dir.path().join(".c.json.tmp").exists());
    }

    #[test]
    fn test_update_existing_skips_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("missing.json"));

        let result = file.update_existing(|c| c.count += 1, |_| {}).unwrap();

        assert!(result.is_none());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_update_existing_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("c.json"));
        file.save(&Counter {
            name: "n".to_string(),
            count: 1,
        })
        .unwrap();

        let mut seen = None;
        let updated = file
            .update_existing(|c| c.count += 4, |c| seen = Some(c.count))
            .unwrap()
            .unwrap();
        assert_eq!(updated.count, 5);
        assert_eq!(seen, Some(5));
        assert!(temp_dir.path().join("c.lock").exists());

        let mut removed = 0;
        file.remove(|| removed += 1).unwrap();
        file.remove(|| removed += 1).unwrap();
        assert_eq!(removed, 2);
        assert!(!temp_dir.path().join("c.lock").exists());
        assert!(file.load().unwrap().is_none());
    }
}
