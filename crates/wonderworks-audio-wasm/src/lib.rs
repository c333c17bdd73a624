//! WebAssembly bindings for the Wonderworks site audio engine
//!
//! This crate runs [`wonderworks_audio::AudioEngine`] in the browser: a Web
//! Audio backend, `localStorage` settings, autoplay unlock on the first
//! gesture, an `IntersectionObserver` over the ambient sections and a 100 ms
//! update tick. Pages drive it through the [`WonderworksAudio`] handle.
//!
//! # Example Usage (JavaScript)
//!
//! ```javascript
//! import init, { WonderworksAudio } from './wonderworks_audio_wasm.js';
//!
//! await init();
//! const audio = new WonderworksAudio();
//!
//! audio.on('trackChange', (event) => {
//!     document.querySelector('#bgm-title').textContent = event.data.title;
//! });
//! document.querySelector('#bgm-play').onclick = () => audio.togglePlay();
//! document.querySelector('#bgm-next').onclick = () => audio.next();
//! document.querySelector('#music-volume').oninput = (e) =>
//!     audio.setVolume('music', Number(e.target.value));
//! ```

#![warn(missing_docs)]

mod backend;
mod dom;
mod logging;
mod outbox;
mod storage;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Function;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wonderworks_audio::{
    AudioEngine, AudioError, Channel, EngineConfig, EngineEvent, Gesture, OneShotOptions, VoiceId,
};

pub use backend::WebAudioBackend;
pub use logging::ConsoleLayer;
pub use storage::LocalStorageStore;

/// Install the panic hook and console logging
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    logging::init(level);
}

/// Readable text for a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn to_js_error(e: AudioError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

/// Channel names come from page markup; an unknown one is a logged no-op.
fn parse_channel(name: &str) -> Option<Channel> {
    match name.parse::<Channel>() {
        Ok(channel) => Some(channel),
        Err(e) => {
            warn!(error = %e, "ignoring audio call");
            None
        }
    }
}

struct JsListener {
    id: u32,
    kind: String,
    callback: Function,
}

/// Engine plus the JS listeners; shared with the page callbacks.
pub(crate) struct Shared {
    engine: RefCell<AudioEngine<WebAudioBackend>>,
    outbox: outbox::Outbox,
    listeners: RefCell<Vec<JsListener>>,
    next_listener: Cell<u32>,
}

impl Shared {
    /// Run an engine operation, then hand queued events to JS listeners once
    /// the engine borrow is released, so listeners may call back in.
    pub(crate) fn with_engine<R>(&self, op: impl FnOnce(&mut AudioEngine<WebAudioBackend>) -> R) -> R {
        let result = {
            let mut engine = self.engine.borrow_mut();
            op(&mut engine)
        };
        self.deliver();
        result
    }

    fn deliver(&self) {
        self.outbox.drain(|event| self.notify(event));
    }

    fn notify(&self, event: &EngineEvent) {
        let payload = match to_js(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(kind = event.kind(), error = %js_message(&e), "event not serializable");
                return;
            }
        };
        let listeners: Vec<(String, Function)> = self
            .listeners
            .borrow()
            .iter()
            .map(|l| (l.kind.clone(), l.callback.clone()))
            .collect();
        for (kind, callback) in &listeners {
            if kind != "*" && kind != event.kind() {
                continue;
            }
            if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                warn!(kind = event.kind(), error = %js_message(&e), "event listener threw");
            }
        }
    }
}

/// Site audio for JavaScript
///
/// One per page. Construction creates the `AudioContext` (suspended until the
/// first gesture), restores settings from `localStorage`, starts decoding every
/// asset and wires the page hooks.
#[wasm_bindgen]
pub struct WonderworksAudio {
    shared: Rc<Shared>,
    _page: dom::PageBindings,
}

impl WonderworksAudio {
    fn with_engine<R>(&self, op: impl FnOnce(&mut AudioEngine<WebAudioBackend>) -> R) -> R {
        self.shared.with_engine(op)
    }
}

#[wasm_bindgen]
impl WonderworksAudio {
    /// Create the engine
    ///
    /// # Arguments
    ///
    /// * `config` - optional engine configuration (camelCase keys, any subset);
    ///   omitted fields keep the site defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WonderworksAudio, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let backend = WebAudioBackend::new().map_err(to_js_error)?;
        let store = LocalStorageStore::new();
        let mut engine =
            AudioEngine::new(backend, Box::new(store), config).map_err(to_js_error)?;

        let outbox = outbox::Outbox::new();
        let sink = outbox.sink();
        engine.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        engine.init();

        let shared = Rc::new(Shared {
            engine: RefCell::new(engine),
            outbox,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        });
        let page = dom::PageBindings::attach(&shared)?;
        info!("site audio ready");

        Ok(WonderworksAudio {
            shared,
            _page: page,
        })
    }

    // ---- events ----

    /// Register a listener for an event kind (`trackChange`,
    /// `playStateChange`, `ambientStateChange`, `volumeChange`, `muteChange`,
    /// `unlock`, or `*` for all). Returns an id for `off`.
    pub fn on(&self, kind: String, callback: Function) -> u32 {
        let id = self.shared.next_listener.get() + 1;
        self.shared.next_listener.set(id);
        self.shared
            .listeners
            .borrow_mut()
            .push(JsListener { id, kind, callback });
        id
    }

    /// Remove a listener. Returns `false` for unknown ids.
    pub fn off(&self, id: u32) -> bool {
        let mut listeners = self.shared.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Snapshot of the whole engine state
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        let state = self.shared.engine.borrow().state();
        to_js(&state)
    }

    /// Selected track details, or `null` with an empty playlist
    #[wasm_bindgen(js_name = currentTrack)]
    pub fn current_track(&self) -> Result<JsValue, JsValue> {
        let track = self.shared.engine.borrow().current_track();
        to_js(&track)
    }

    /// Unlock audio from a custom gesture handler. Returns `true` if this call
    /// unlocked audio.
    pub fn unlock(&self) -> bool {
        self.with_engine(|engine| engine.unlock(Gesture::Click))
    }

    /// True once audio is allowed
    #[wasm_bindgen(js_name = isUnlocked)]
    pub fn is_unlocked(&self) -> bool {
        self.shared.engine.borrow().is_unlocked()
    }

    // ---- music ----

    /// Play the selected track
    pub fn play(&self) {
        self.with_engine(|engine| engine.play());
    }

    /// Pause, keeping the position
    pub fn pause(&self) {
        self.with_engine(|engine| engine.pause());
    }

    /// Play or pause; returns the new intent
    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&self) -> bool {
        self.with_engine(|engine| engine.toggle_play())
    }

    /// Pause and rewind
    pub fn stop(&self) {
        self.with_engine(|engine| engine.stop());
    }

    /// Next track
    pub fn next(&self) {
        self.with_engine(|engine| engine.next());
    }

    /// Previous track, or restart the current one
    pub fn prev(&self) {
        self.with_engine(|engine| engine.prev());
    }

    /// Select a track by index (wrapped into range) and pause there
    pub fn load(&self, index: i32) {
        self.with_engine(|engine| engine.load(i64::from(index)));
    }

    /// Jump within the selected track
    pub fn seek(&self, seconds: f64) {
        self.with_engine(|engine| engine.seek(seconds));
    }

    /// Set shuffle mode
    #[wasm_bindgen(js_name = setShuffle)]
    pub fn set_shuffle(&self, on: bool) {
        self.with_engine(|engine| engine.set_shuffle(on));
    }

    /// Flip shuffle mode
    #[wasm_bindgen(js_name = toggleShuffle)]
    pub fn toggle_shuffle(&self) -> bool {
        self.with_engine(|engine| engine.toggle_shuffle())
    }

    /// Set repeat mode
    #[wasm_bindgen(js_name = setRepeat)]
    pub fn set_repeat(&self, on: bool) {
        self.with_engine(|engine| engine.set_repeat(on));
    }

    /// Flip repeat mode
    #[wasm_bindgen(js_name = toggleRepeat)]
    pub fn toggle_repeat(&self) -> bool {
        self.with_engine(|engine| engine.toggle_repeat())
    }

    // ---- ambient ----

    /// Request the ambient loop
    #[wasm_bindgen(js_name = playAmbient)]
    pub fn play_ambient(&self) {
        self.with_engine(|engine| engine.play_ambient());
    }

    /// Pause the ambient loop
    #[wasm_bindgen(js_name = pauseAmbient)]
    pub fn pause_ambient(&self) {
        self.with_engine(|engine| engine.pause_ambient());
    }

    /// Ambient master switch
    #[wasm_bindgen(js_name = setAmbientEnabled)]
    pub fn set_ambient_enabled(&self, enabled: bool) {
        self.with_engine(|engine| engine.set_ambient_enabled(enabled));
    }

    /// Flip the ambient master switch
    #[wasm_bindgen(js_name = toggleAmbient)]
    pub fn toggle_ambient(&self) -> bool {
        self.with_engine(|engine| engine.toggle_ambient())
    }

    /// Report a section's visibility by hand (pages without observers)
    #[wasm_bindgen(js_name = reportVisibility)]
    pub fn report_visibility(&self, section: &str, visible: bool) {
        self.with_engine(|engine| engine.report_visibility(section, visible));
    }

    // ---- sound effects ----

    /// Play a named effect; `volume` overrides its default gain. Returns
    /// `false` if the effect was dropped.
    #[wasm_bindgen(js_name = playOneShot)]
    pub fn play_one_shot(&self, name: &str, volume: Option<f32>) -> bool {
        let options = OneShotOptions {
            volume,
            ..OneShotOptions::default()
        };
        self.with_engine(|engine| engine.play_one_shot_with(name, options))
            .is_some()
    }

    /// Play a named effect that `releaseHeld` fades out (hover sounds).
    /// Returns a voice id, or `undefined` if dropped.
    #[wasm_bindgen(js_name = holdOneShot)]
    pub fn hold_one_shot(&self, name: &str) -> Option<f64> {
        self.with_engine(|engine| engine.hold_one_shot(name))
            .map(|voice| voice.0 as f64)
    }

    /// Fade out a held effect
    #[wasm_bindgen(js_name = releaseHeld)]
    pub fn release_held(&self, voice: f64) -> bool {
        if !voice.is_finite() || voice < 0.0 {
            return false;
        }
        self.with_engine(|engine| engine.release_held(VoiceId(voice as u64)))
    }

    // ---- mixer ----

    /// Set a channel's volume (`music`, `ambient` or `sfx`; clamped to 0..1)
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, channel: &str, volume: f32) {
        if let Some(channel) = parse_channel(channel) {
            self.with_engine(|engine| engine.set_volume(channel, volume));
        }
    }

    /// A channel's volume, or `undefined` for an unknown channel
    #[wasm_bindgen(js_name = getVolume)]
    pub fn volume(&self, channel: &str) -> Option<f32> {
        let channel = parse_channel(channel)?;
        Some(self.shared.engine.borrow().volume(channel))
    }

    /// Step a channel's volume; returns the new value
    #[wasm_bindgen(js_name = nudgeVolume)]
    pub fn nudge_volume(&self, channel: &str, delta: f32) -> Option<f32> {
        let channel = parse_channel(channel)?;
        Some(self.with_engine(|engine| engine.nudge_volume(channel, delta)))
    }

    /// Ramp a channel to a new volume
    #[wasm_bindgen(js_name = fadeTo)]
    pub fn fade_to(&self, channel: &str, volume: f32, duration_ms: u32) {
        if let Some(channel) = parse_channel(channel) {
            self.with_engine(|engine| engine.fade_to(channel, volume, duration_ms));
        }
    }

    /// Mute or unmute a channel
    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, channel: &str, muted: bool) {
        if let Some(channel) = parse_channel(channel) {
            self.with_engine(|engine| engine.set_muted(channel, muted));
        }
    }

    /// A channel's mute flag (`false` for an unknown channel)
    #[wasm_bindgen(js_name = isMuted)]
    pub fn is_muted(&self, channel: &str) -> bool {
        parse_channel(channel).is_some_and(|ch| self.shared.engine.borrow().is_muted(ch))
    }

    /// Flip a channel's mute flag; returns the new flag
    #[wasm_bindgen(js_name = toggleMuted)]
    pub fn toggle_muted(&self, channel: &str) -> Option<bool> {
        let channel = parse_channel(channel)?;
        Some(self.with_engine(|engine| engine.toggle_muted(channel)))
    }
}
