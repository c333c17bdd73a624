//! `localStorage`-backed settings

use tracing::warn;
use web_sys::Storage;
use wonderworks_audio::{AudioError, Result, SettingsStore};

use crate::js_message;

/// [`SettingsStore`] over `window.localStorage`.
///
/// Private browsing modes may deny storage entirely; reads then return
/// nothing and writes fail, which the engine logs and ignores.
pub struct LocalStorageStore {
    storage: Option<Storage>,
}

impl LocalStorageStore {
    /// Bind to the page's `localStorage`, if the browser allows it.
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            warn!("localStorage unavailable, settings will not persist");
        }
        Self { storage }
    }

    /// True if a storage area is available.
    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }
}

impl Default for LocalStorageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| AudioError::storage("localStorage unavailable"))?;
        storage
            .set_item(key, value)
            .map_err(|e| AudioError::storage(js_message(&e)))
    }
}
