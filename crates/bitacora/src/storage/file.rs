//! File-backed storage.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument, warn};

use super::{KeyValueStore, StorageError};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Storage backed by a single JSON object file.
///
/// Each write takes an exclusive lock on a sibling `.lock` file, writes the
/// whole document to a sibling `.tmp` file, syncs it and renames it over the
/// original. On Unix the file is created owner-only (`0600`). A document
/// that fails to parse is replaced on the next write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

type Entries = BTreeMap<String, String>;

impl FileStore {
    /// Create a store at `path`. Parent directories are created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.sibling(".lock"))?)
    }

    fn read_entries(&self) -> Result<Entries, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(json) if json.trim().is_empty() => Ok(Entries::new()),
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.sibling(".tmp");
        match fs::remove_file(&tmp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_data()?;
        drop(file);

        // Readers see the old document or the new one, never a partial write.
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Entries),
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let result = match self.read_entries() {
            Err(StorageError::Corrupt(e)) => {
                warn!(error = %e, path = %self.path.display(), "session file is corrupt, replacing it");
                Ok(Entries::new())
            }
            other => other,
        }
        .and_then(|mut entries| {
            apply(&mut entries);
            self.write_entries(&entries)
        });

        lock.unlock()?;
        result
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let entries = self.read_entries();
        lock.unlock()?;

        Ok(entries?.get(key).cloned())
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!("writing storage key");
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }

        debug!("removing storage key");
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
