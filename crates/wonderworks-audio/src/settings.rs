//! Persisted user settings
//!
//! Settings live in a flat string key-value store (browser `localStorage`, a
//! JSON file, or memory). Loading merges stored values over defaults one key at
//! a time, so a missing or malformed value only loses that one setting. Writes
//! are best-effort: a failing store is logged and the engine keeps running on
//! its in-memory state.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::channel::{Channel, ChannelMap};
use crate::envelope::clamp_unit;
use crate::error::{AudioError, Result};

/// A flat string key-value store.
pub trait SettingsStore {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// In-process store.
///
/// Clones share the same map, so a test can keep a handle, drop the engine and
/// build a new one over the same data to simulate a page reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Rc<RefCell<BTreeMap<String, String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (quota exceeded, private mode).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Put a raw value, bypassing the failure switch.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.borrow_mut().insert(key.into(), value.into());
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(AudioError::storage("storage quota exceeded"));
        }
        self.insert(key, value);
        Ok(())
    }
}

/// Store backed by a JSON object on disk, for native hosts.
///
/// The whole map is rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a settings file, starting empty if it does not exist.
    ///
    /// A file that is not a JSON object of strings is logged and ignored; it
    /// is replaced on the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = fs::read_to_string(&path)?;
            match serde_json::from_str(&text) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Key names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingKeys {
    prefix: String,
}

impl SettingKeys {
    /// Keys under `prefix` (e.g. `"ona.audio.v1."`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// `<channel>.volume`
    pub fn volume(&self, channel: Channel) -> String {
        self.key(&format!("{channel}.volume"))
    }

    /// `<channel>.muted`
    pub fn muted(&self, channel: Channel) -> String {
        self.key(&format!("{channel}.muted"))
    }

    /// `music.index`
    pub fn music_index(&self) -> String {
        self.key("music.index")
    }

    /// `music.position`
    pub fn music_position(&self) -> String {
        self.key("music.position")
    }

    /// `music.shuffle`
    pub fn music_shuffle(&self) -> String {
        self.key("music.shuffle")
    }

    /// `music.repeat`
    pub fn music_repeat(&self) -> String {
        self.key("music.repeat")
    }

    /// `ambient.enabled`
    pub fn ambient_enabled(&self) -> String {
        self.key("ambient.enabled")
    }

    /// `ambient.position`
    pub fn ambient_position(&self) -> String {
        self.key("ambient.position")
    }
}

impl Default for SettingKeys {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SETTINGS_PREFIX)
    }
}

/// Every persisted setting, typed.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSettings {
    /// Slider value per channel
    pub volumes: ChannelMap<f32>,
    /// Mute flag per channel
    pub muted: ChannelMap<bool>,
    /// Playlist position
    pub music_index: usize,
    /// Music resume point in seconds
    pub music_position: f64,
    /// Shuffle mode
    pub shuffle: bool,
    /// Repeat mode
    pub repeat: bool,
    /// Ambient master switch
    pub ambient_enabled: bool,
    /// Ambient resume point in seconds
    pub ambient_position: f64,
}

impl PersistedSettings {
    /// Defaults for a fresh profile with the given volumes.
    pub fn with_volumes(volumes: ChannelMap<f32>) -> Self {
        Self {
            volumes,
            muted: ChannelMap::default(),
            music_index: 0,
            music_position: 0.0,
            shuffle: false,
            repeat: false,
            ambient_enabled: true,
            ambient_position: 0.0,
        }
    }

    /// Read every key, keeping the default for anything missing or malformed.
    pub fn load(store: &dyn SettingsStore, keys: &SettingKeys, defaults: &Self) -> Self {
        let volumes = defaults.volumes.map(|ch, default| {
            read(store, &keys.volume(ch), parse_unit).unwrap_or(*default)
        });
        let muted = defaults
            .muted
            .map(|ch, default| read(store, &keys.muted(ch), parse_bool).unwrap_or(*default));
        Self {
            volumes,
            muted,
            music_index: read(store, &keys.music_index(), parse_index)
                .unwrap_or(defaults.music_index),
            music_position: read(store, &keys.music_position(), parse_position)
                .unwrap_or(defaults.music_position),
            shuffle: read(store, &keys.music_shuffle(), parse_bool).unwrap_or(defaults.shuffle),
            repeat: read(store, &keys.music_repeat(), parse_bool).unwrap_or(defaults.repeat),
            ambient_enabled: read(store, &keys.ambient_enabled(), parse_bool)
                .unwrap_or(defaults.ambient_enabled),
            ambient_position: read(store, &keys.ambient_position(), parse_position)
                .unwrap_or(defaults.ambient_position),
        }
    }
}

fn read<T>(store: &dyn SettingsStore, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = store.get(key)?;
    let value = parse(raw.trim());
    if value.is_none() {
        debug!(key, raw = %raw, "malformed setting, using default");
    }
    value
}

fn parse_unit(raw: &str) -> Option<f32> {
    raw.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(clamp_unit)
}

fn parse_position(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Best-effort writer for settings.
pub struct Persistence {
    store: Box<dyn SettingsStore>,
    keys: SettingKeys,
}

impl Persistence {
    /// Wrap a store.
    pub fn new(store: Box<dyn SettingsStore>, keys: SettingKeys) -> Self {
        Self { store, keys }
    }

    /// Key names in use.
    pub fn keys(&self) -> &SettingKeys {
        &self.keys
    }

    /// Load everything, merged over `defaults`.
    pub fn load(&self, defaults: &PersistedSettings) -> PersistedSettings {
        PersistedSettings::load(self.store.as_ref(), &self.keys, defaults)
    }

    fn write(&mut self, key: String, value: String) {
        if let Err(e) = self.store.set(&key, &value) {
            warn!(key = %key, error = %e, "failed to persist setting");
        }
    }

    /// Persist a channel volume.
    pub fn write_volume(&mut self, channel: Channel, volume: f32) {
        self.write(self.keys.volume(channel), volume.to_string());
    }

    /// Persist a channel mute flag.
    pub fn write_muted(&mut self, channel: Channel, muted: bool) {
        self.write(self.keys.muted(channel), muted.to_string());
    }

    /// Persist the playlist index and resume point together.
    pub fn write_music(&mut self, index: usize, position: f64) {
        self.write(self.keys.music_index(), index.to_string());
        self.write(self.keys.music_position(), format!("{position:.3}"));
    }

    /// Persist shuffle and repeat.
    pub fn write_modes(&mut self, shuffle: bool, repeat: bool) {
        self.write(self.keys.music_shuffle(), shuffle.to_string());
        self.write(self.keys.music_repeat(), repeat.to_string());
    }

    /// Persist the ambient master switch.
    pub fn write_ambient_enabled(&mut self, enabled: bool) {
        self.write(self.keys.ambient_enabled(), enabled.to_string());
    }

    /// Persist the ambient resume point.
    pub fn write_ambient_position(&mut self, position: f64) {
        self.write(self.keys.ambient_position(), format!("{position:.3}"));
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}
