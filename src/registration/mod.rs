//! Application registration record and its persistence.
//!
//! Provides:
//! - [`RegistrationRecord`]: the app token and tracking id handed out by the box
//! - [`RegistrationStore`]: load/save seam, with JSON-file and in-memory backends
//! - [`Registry`]: lazy, cached access to the stored record
//!
//! A record is usable once it has both a tracking id and a non-empty token.
//! It only changes through re-registration, which overwrites the store.

pub mod store;

pub use store::{FileStore, MemoryStore, RegistrationStore};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Credentials returned by the authorization endpoint.
///
/// Field names match the on-disk JSON so existing registration files load as is.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub track_id: Option<u64>,
}

impl RegistrationRecord {
    pub fn new(app_token: impl Into<String>, track_id: u64) -> Self {
        Self {
            app_token: app_token.into(),
            track_id: Some(track_id),
        }
    }

    /// True iff the record has a tracking id and a non-empty token.
    pub fn is_usable(&self) -> bool {
        self.track_id.is_some() && !self.app_token.is_empty()
    }
}

impl std::fmt::Debug for RegistrationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRecord")
            .field("app_token", &if self.app_token.is_empty() { "" } else { "<redacted>" })
            .field("track_id", &self.track_id)
            .finish()
    }
}

/// Lazily loaded view over a [`RegistrationStore`].
///
/// The store is read the first time a usable record is needed and again only
/// while the cached record is still unusable.
pub struct Registry {
    store: Box<dyn RegistrationStore>,
    cached: RegistrationRecord,
}

impl Registry {
    pub fn new(store: Box<dyn RegistrationStore>) -> Self {
        Self {
            store,
            cached: RegistrationRecord::default(),
        }
    }

    /// Current record, loading it from the store if needed.
    pub fn record(&mut self) -> Result<&RegistrationRecord> {
        if !self.cached.is_usable() {
            if let Some(loaded) = self.store.load()? {
                tracing::debug!(track_id = ?loaded.track_id, "loaded registration");
                self.cached = loaded;
            }
        }
        Ok(&self.cached)
    }

    /// Usable record, or `None` when the app has never been registered.
    pub fn usable(&mut self) -> Result<Option<&RegistrationRecord>> {
        let record = self.record()?;
        Ok(record.is_usable().then_some(record))
    }

    pub fn has_usable_registration(&mut self) -> Result<bool> {
        Ok(self.record()?.is_usable())
    }

    /// Persist a new record, replacing whatever was stored.
    pub fn replace(&mut self, record: RegistrationRecord) -> Result<()> {
        self.store.save(&record)?;
        self.cached = record;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fresh_record_is_not_usable() {
        assert!(!RegistrationRecord::default().is_usable());
    }

    #[test]
    fn usable_needs_token_and_track_id() {
        assert!(RegistrationRecord::new("T1", 42).is_usable());
        assert!(!RegistrationRecord::new("", 42).is_usable());
        let no_id = RegistrationRecord {
            app_token: "T1".into(),
            track_id: None,
        };
        assert!(!no_id.is_usable());
    }

    #[test]
    fn debug_redacts_token() {
        let text = format!("{:?}", RegistrationRecord::new("secret-token", 3));
        assert!(!text.contains("secret-token"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn json_shape_matches_registration_file() {
        let record: RegistrationRecord =
            serde_json::from_str(r#"{"app_token": "T1", "track_id": 42}"#).unwrap();
        assert_eq!(record, RegistrationRecord::new("T1", 42));

        let empty: RegistrationRecord =
            serde_json::from_str(r#"{"app_token": "", "track_id": null}"#).unwrap();
        assert!(!empty.is_usable());
    }

    #[test]
    fn registry_loads_lazily() {
        let store = Arc::new(MemoryStore::with(RegistrationRecord::new("T1", 42)));
        let mut registry = Registry::new(Box::new(store.clone()));
        assert_eq!(store.loads(), 0);

        assert!(registry.has_usable_registration().unwrap());
        assert!(registry.has_usable_registration().unwrap());
        assert_eq!(store.loads(), 1);
    }

    #[test]
    fn registry_without_record_is_unusable() {
        let mut registry = Registry::new(Box::new(MemoryStore::default()));
        assert!(!registry.has_usable_registration().unwrap());
        assert!(registry.usable().unwrap().is_none());
    }

    #[test]
    fn replace_persists_and_caches() {
        let store = Arc::new(MemoryStore::default());
        let mut registry = Registry::new(Box::new(store.clone()));
        registry.replace(RegistrationRecord::new("T2", 7)).unwrap();

        assert_eq!(store.current(), Some(RegistrationRecord::new("T2", 7)));
        assert_eq!(registry.record().unwrap().track_id, Some(7));
    }
}
