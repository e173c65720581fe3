//! Registration persistence backends.
//!
//! The store is an opaque blob: one record in, one record out.
//! - [`FileStore`]: JSON file, owner-only permissions on Unix
//! - [`MemoryStore`]: process-local, for tests and dry runs

use super::RegistrationRecord;
use crate::error::{FbxError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Load/save seam for the registration record.
pub trait RegistrationStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<RegistrationRecord>>;

    /// Overwrite the stored record.
    fn save(&self, record: &RegistrationRecord) -> Result<()>;
}

impl<S: RegistrationStore + ?Sized> RegistrationStore for Arc<S> {
    fn load(&self) -> Result<Option<RegistrationRecord>> {
        (**self).load()
    }

    fn save(&self, record: &RegistrationRecord) -> Result<()> {
        (**self).save(record)
    }
}

/// JSON file holding `{"app_token": "...", "track_id": N}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn store_error(&self, reason: impl std::fmt::Display) -> FbxError {
        FbxError::Store {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl RegistrationStore for FileStore {
    fn load(&self) -> Result<Option<RegistrationRecord>> {
        tracing::debug!(path = %self.path.display(), "reading registration file");
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.store_error(e))?;
        let record = serde_json::from_str(&contents)
            .map_err(|e| self.store_error(format!("invalid registration data: {e}")))?;
        Ok(Some(record))
    }

    fn save(&self, record: &RegistrationRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.store_error(e))?;
        }
        let json = serde_json::to_string(record).map_err(|e| self.store_error(e))?;
        std::fs::write(&self.path, json).map_err(|e| self.store_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.store_error(e))?;
        }

        tracing::debug!(path = %self.path.display(), track_id = ?record.track_id, "saved registration");
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<RegistrationRecord>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    pub fn with(record: RegistrationRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> Option<RegistrationRecord> {
        self.record.lock().clone()
    }

    /// Number of `load` calls served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl RegistrationStore for MemoryStore {
    fn load(&self) -> Result<Option<RegistrationRecord>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &RegistrationRecord) -> Result<()> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("registration.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nested").join("registration.json"));

        store.save(&RegistrationRecord::new("T1", 42)).unwrap();
        assert_eq!(store.load().unwrap(), Some(RegistrationRecord::new("T1", 42)));
    }

    #[test]
    fn save_overwrites_previous_record() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("registration.json"));

        store.save(&RegistrationRecord::new("T1", 42)).unwrap();
        store.save(&RegistrationRecord::new("T2", 43)).unwrap();
        assert_eq!(store.load().unwrap(), Some(RegistrationRecord::new("T2", 43)));
    }

    #[test]
    fn reads_file_written_by_hand() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fbx.reg");
        std::fs::write(&path, r#"{"app_token": "abc", "track_id": 5}"#).unwrap();

        let record = FileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(record, RegistrationRecord::new("abc", 5));
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("registration.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert_eq!(err.kind(), "store");
        assert!(err.to_string().contains("invalid registration data"));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("registration.json"));
        store.save(&RegistrationRecord::new("T1", 1)).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_counts_loads() {
        let store = MemoryStore::default();
        assert!(store.load().unwrap().is_none());
        store.save(&RegistrationRecord::new("T1", 1)).unwrap();
        assert!(store.load().unwrap().is_some());
        assert_eq!(store.loads(), 2);
    }
}
