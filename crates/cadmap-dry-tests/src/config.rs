// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cadmap_app_core::config::{ConfigError, ConfigStore, PREFS_KEY};
use cadmap_app_core::prefs::MapPrefs;

/// In-memory [`ConfigStore`] with call counters and failure switches.
///
/// Clones share state, so a test can hand one clone to a `ConfigService`
/// and inspect the other.
///
/// # Example
///
/// ```
/// use cadmap_dry_tests::InMemoryConfigStore;
/// use cadmap_app_core::config::ConfigService;
/// use cadmap_app_core::config_port::ConfigPort;
/// use cadmap_app_core::prefs::MapPrefs;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// service.save_prefs(&MapPrefs::default());
/// assert_eq!(store.save_count(), 1);
/// assert_eq!(service.load_prefs(), Some(MapPrefs::default()));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already holding `prefs` under [`PREFS_KEY`].
    pub fn with_prefs(prefs: &MapPrefs) -> Self {
        let store = Self::new();
        if let Ok(bytes) = serde_json::to_vec(prefs) {
            store.lock().data.insert(PREFS_KEY.to_owned(), bytes);
        }
        store
    }

    /// Store holding raw bytes under `key` (e.g. a corrupt prefs file).
    pub fn with_raw(key: &str, bytes: &[u8]) -> Self {
        let store = Self::new();
        store.lock().data.insert(key.to_owned(), bytes.to_vec());
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every load fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make every save fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Load attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Save attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Raw bytes stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }

    /// Prefs currently stored, if they parse.
    pub fn stored_prefs(&self) -> Option<MapPrefs> {
        self.raw(PREFS_KEY)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use cadmap_app_core::config::ConfigService;
    use cadmap_app_core::config_port::ConfigPort;

    #[test]
    fn prefs_round_trip_through_the_service() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());
        let mut prefs = MapPrefs::default();
        prefs.layers.visible = vec!["zonage_plu".into()];
        service.save_prefs(&prefs);
        assert_eq!(store.stored_prefs(), Some(prefs.clone()));
        assert_eq!(service.load_prefs(), Some(prefs));
    }

    #[test]
    fn corrupt_prefs_load_as_none() {
        let store = InMemoryConfigStore::with_raw(PREFS_KEY, b"{not json");
        let service = ConfigService::new(store.clone());
        assert_eq!(service.load_prefs(), None);
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn failures_are_counted() {
        let store = InMemoryConfigStore::with_prefs(&MapPrefs::default());
        store.set_fail_on_load(true);
        store.set_fail_on_save(true);
        assert!(matches!(store.load_raw(PREFS_KEY), Err(ConfigError::Other(_))));
        assert!(store.save_raw(PREFS_KEY, b"{}").is_err());
        assert_eq!((store.load_count(), store.save_count()), (1, 1));
        assert!(store.stored_prefs().is_some());
    }
}
