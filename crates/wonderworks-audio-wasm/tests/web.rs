//! Browser tests, run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use wonderworks_audio::{AudioBackend, OutputState, SettingsStore};
use wonderworks_audio_wasm::{LocalStorageStore, WebAudioBackend, WonderworksAudio};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_round_trip() {
    let mut store = LocalStorageStore::new();
    assert!(store.is_available());
    store.set("ona.audio.test.music.volume", "0.42").unwrap();
    assert_eq!(
        store.get("ona.audio.test.music.volume").as_deref(),
        Some("0.42")
    );
}

#[wasm_bindgen_test]
fn backend_starts_suspended_with_unloaded_assets() {
    let backend = WebAudioBackend::new().unwrap();
    assert_ne!(backend.output_state(), OutputState::Closed);
    assert!(backend.now() >= 0.0);
    assert_eq!(
        backend.asset("/assets/never-requested.mp3"),
        wonderworks_audio::AssetState::Unloaded
    );
    assert_eq!(backend.live_voices(), 0);
}

#[wasm_bindgen_test]
fn handle_exposes_state_and_channels() {
    let audio = WonderworksAudio::new(JsValue::UNDEFINED).unwrap();
    let state = audio.get_state().unwrap();
    let total = js_sys::Reflect::get(&state, &JsValue::from_str("totalTracks")).unwrap();
    assert_eq!(total.as_f64(), Some(3.0));

    audio.set_volume("music", 0.5);
    assert_eq!(audio.volume("music"), Some(0.5));
    audio.set_volume("voice", 0.5);
    assert_eq!(audio.volume("voice"), None);
    assert!(!audio.play_one_shot("click", None), "locked before a gesture");
}

#[wasm_bindgen_test]
fn listeners_can_be_removed() {
    let audio = WonderworksAudio::new(JsValue::UNDEFINED).unwrap();
    let id = audio.on("volumeChange".into(), js_sys::Function::new_no_args(""));
    assert!(audio.off(id));
    assert!(!audio.off(id));
}
