//! Site audio engine for Onna-Stick Wonderworks
//!
//! This crate owns everything the site does with sound, independent of the
//! platform that actually produces it:
//!
//! - three independently mixed channels (music, ambient, sound effects)
//! - a background-music playlist transport with shuffle, repeat and crossfades
//! - a section-scoped ambient loop driven by visibility reports
//! - short one-shot effects with click-free attack/release envelopes
//! - the one-time autoplay unlock handshake browsers require
//! - best-effort persistence of volumes, mute flags and resume points
//!
//! The platform is reached through the [`AudioBackend`] trait. The browser
//! implementation lives in the `wonderworks-audio-wasm` crate; this crate ships
//! [`HeadlessBackend`], a deterministic in-memory backend with a manual clock.
//!
//! # Quick start
//!
//! ```
//! use wonderworks_audio::{
//!     AudioEngine, Channel, EngineConfig, Gesture, HeadlessBackend, MemoryStore, Track,
//! };
//!
//! let backend = HeadlessBackend::new().with_asset("/assets/bgm-1.mp3", 120.0);
//! let config = EngineConfig::default()
//!     .with_playlist(vec![Track::new("/assets/bgm-1.mp3", "BGM Track 1")]);
//!
//! let mut engine = AudioEngine::new(backend, Box::new(MemoryStore::new()), config).unwrap();
//! engine.init();
//!
//! // Before the first gesture the request is remembered, not attempted.
//! engine.play();
//! assert!(!engine.state().playing);
//!
//! engine.unlock(Gesture::Click);
//! assert!(engine.state().playing);
//!
//! engine.set_volume(Channel::Music, 0.5);
//! assert_eq!(engine.volume(Channel::Music), 0.5);
//! ```

#![warn(missing_docs)]

pub mod ambient;
pub mod backend;
pub mod channel;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod events;
pub mod headless;
pub mod mixer;
pub mod playlist;
pub mod settings;
pub mod sfx;
pub mod transport;
pub mod unlock;
pub mod visibility;

pub use backend::{AssetState, AudioBackend, OutputState, VoiceId, VoiceSpec};
pub use channel::{Channel, ChannelMap};
pub use config::{AmbientConfig, EngineConfig, FadeTimings};
pub use engine::{AudioEngine, EngineSnapshot};
pub use envelope::{Envelope, FadeController, GainPoint, OneShotEnvelope, VolumeCurve};
pub use error::{AudioError, Result};
pub use events::{EngineEvent, ListenerId};
pub use headless::{HeadlessBackend, HeadlessVoice, ResumeMode};
pub use mixer::{ChannelMixer, ChannelState};
pub use playlist::{Advance, Playlist, Track, TrackInfo};
pub use settings::{JsonFileStore, MemoryStore, PersistedSettings, SettingKeys, SettingsStore};
pub use sfx::{OneShotOptions, SfxBank, SfxDefinition};
pub use transport::{MusicTransport, TransportState};
pub use unlock::{GateState, Gesture, UnlockGate};
pub use visibility::{AmbientDirective, VisibilityRouter};

/// Gain written to the master stage that all channels feed into.
pub const DEFAULT_MASTER_GAIN: f32 = 0.9;

/// Prefix shared by every persisted settings key.
pub const DEFAULT_SETTINGS_PREFIX: &str = "ona.audio.v1.";
