//! One-shot sound effects
//!
//! Effects are registered by name and played fire-and-forget on the SFX
//! channel, each wrapped in a short attack/release envelope so percussive
//! samples neither click in nor click out. A "held" effect (logo hover) is the
//! same voice with an early release triggered by the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{AssetState, AudioBackend, VoiceId, VoiceSpec};
use crate::channel::Channel;
use crate::envelope::{clamp_unit, OneShotEnvelope};

fn unit_gain() -> f32 {
    1.0
}

fn default_attack_ms() -> u32 {
    15
}

fn default_release_ms() -> u32 {
    150
}

/// A named one-shot effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfxDefinition {
    /// Name callers play it by
    pub name: String,
    /// Asset path or URL
    pub source: String,
    /// Per-effect gain
    #[serde(default = "unit_gain")]
    pub gain: f32,
    /// Attack time
    #[serde(default = "default_attack_ms")]
    pub attack_ms: u32,
    /// Release time
    #[serde(default = "default_release_ms")]
    pub release_ms: u32,
}

impl SfxDefinition {
    /// Effect at unit gain with the default 15/150 ms envelope.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            gain: unit_gain(),
            attack_ms: default_attack_ms(),
            release_ms: default_release_ms(),
        }
    }

    /// Override the gain.
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Override attack and release.
    pub fn with_envelope(mut self, attack_ms: u32, release_ms: u32) -> Self {
        self.attack_ms = attack_ms;
        self.release_ms = release_ms;
        self
    }

    /// The effects used across the site.
    pub fn site_defaults() -> Vec<Self> {
        vec![
            Self::new("logoHover", "/assets/sfx-logo-hover.mp3"),
            Self::new("logoClick", "/assets/sfx-logo-click.wav")
                .with_gain(0.9)
                .with_envelope(12, 140),
            Self::new("uiPop", "/assets/ui-pop-soft.mp3"),
            Self::new("click", "/assets/sfx-old-computer-click.mp3"),
            Self::new("typing", "/assets/sfx-answers-typing.mp3"),
            Self::new("notification", "/assets/sfx-system-notification.mp3"),
            Self::new("hover", "/assets/sfx-logo-hover.mp3"),
        ]
    }
}

/// Per-call overrides for a one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OneShotOptions {
    /// Replaces the effect's gain
    pub volume: Option<f32>,
    /// Replaces the attack time
    pub attack_ms: Option<u32>,
    /// Replaces the release time
    pub release_ms: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct HeldVoice {
    voice: VoiceId,
    release: f64,
    ends_at: f64,
}

/// Registered effects plus the voices currently held.
#[derive(Debug, Clone, Default)]
pub struct SfxBank {
    effects: BTreeMap<String, SfxDefinition>,
    held: Vec<HeldVoice>,
}

impl SfxBank {
    /// Register effects. A later definition replaces an earlier one of the
    /// same name.
    pub fn new(definitions: impl IntoIterator<Item = SfxDefinition>) -> Self {
        let effects = definitions
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();
        Self {
            effects,
            held: Vec::new(),
        }
    }

    /// Look up an effect.
    pub fn get(&self, name: &str) -> Option<&SfxDefinition> {
        self.effects.get(name)
    }

    /// Registered effect names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    /// Start decoding every effect.
    pub fn preload_all<B: AudioBackend + ?Sized>(&self, backend: &mut B) {
        for def in self.effects.values() {
            backend.preload(&def.source);
        }
    }

    /// Play an effect once. Returns `None` when it was dropped.
    pub fn play<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        options: OneShotOptions,
    ) -> Option<VoiceId> {
        self.start(backend, name, options).map(|(voice, _, _)| voice)
    }

    /// Play an effect and keep it releasable with [`SfxBank::release`].
    pub fn hold<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        options: OneShotOptions,
    ) -> Option<VoiceId> {
        let now = backend.now();
        self.held.retain(|h| h.ends_at > now);
        let (voice, shape, ends_at) = self.start(backend, name, options)?;
        self.held.push(HeldVoice {
            voice,
            release: shape.release,
            ends_at,
        });
        Some(voice)
    }

    /// Fade out a held voice over its release time. Returns `false` if the
    /// voice is not held (already released or finished).
    pub fn release<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, voice: VoiceId) -> bool {
        let Some(pos) = self.held.iter().position(|h| h.voice == voice) else {
            return false;
        };
        let held = self.held.swap_remove(pos);
        let now = backend.now();
        if held.ends_at <= now {
            return false;
        }
        backend.ramp_voice(voice, 0.0, now, held.release);
        backend.stop_voice(voice, now + held.release);
        true
    }

    fn start<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        options: OneShotOptions,
    ) -> Option<(VoiceId, OneShotEnvelope, f64)> {
        let Some(def) = self.effects.get(name) else {
            warn!(effect = name, "unknown sound effect");
            return None;
        };
        let duration = match backend.asset(&def.source) {
            AssetState::Ready { duration } => duration,
            AssetState::Unloaded => {
                backend.preload(&def.source);
                debug!(effect = name, "sound effect not decoded yet, dropped");
                return None;
            }
            AssetState::Loading => {
                debug!(effect = name, "sound effect not decoded yet, dropped");
                return None;
            }
            AssetState::Failed(reason) => {
                debug!(effect = name, reason = %reason, "sound effect unavailable");
                return None;
            }
        };
        let shape = OneShotEnvelope::from_millis(
            options.attack_ms.unwrap_or(def.attack_ms),
            options.release_ms.unwrap_or(def.release_ms),
        );
        let volume = clamp_unit(options.volume.unwrap_or(def.gain));
        let now = backend.now();
        let spec = VoiceSpec::new(Channel::Sfx, def.source.clone())
            .with_gain(0.0)
            .with_envelope(shape.points(now, duration, volume));
        match backend.start_voice(spec) {
            Ok(voice) => {
                debug!(effect = name, ?voice, "sound effect");
                Some((voice, shape, now + duration))
            }
            Err(e) => {
                warn!(effect = name, error = %e, "failed to start sound effect");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use approx::assert_relative_eq;

    fn bank_with_backend() -> (SfxBank, HeadlessBackend) {
        let mut backend = HeadlessBackend::new()
            .with_asset("/assets/sfx-logo-hover.mp3", 1.2)
            .with_asset("/assets/sfx-logo-click.wav", 0.4);
        let bank = SfxBank::new(SfxDefinition::site_defaults());
        bank.preload_all(&mut backend);
        (bank, backend)
    }

    #[test]
    fn test_play_wraps_envelope() {
        let (mut bank, mut backend) = bank_with_backend();
        backend.set_time(3.0);
        let voice = bank
            .play(&mut backend, "logoClick", OneShotOptions::default())
            .unwrap();
        let v = backend.voice(voice).unwrap();
        assert_eq!(v.channel, Channel::Sfx);
        assert_eq!(v.envelope.len(), 4);
        assert_relative_eq!(v.envelope[1].time, 3.012, epsilon = 1e-9);
        assert_relative_eq!(v.envelope[1].value, 0.9);
        assert_relative_eq!(v.envelope[2].time, 3.26, epsilon = 1e-9);
        assert_eq!(v.envelope[3].value, 0.0);
    }

    #[test]
    fn test_options_override_definition() {
        let (mut bank, mut backend) = bank_with_backend();
        let options = OneShotOptions {
            volume: Some(0.5),
            attack_ms: Some(20),
            release_ms: None,
        };
        let voice = bank.play(&mut backend, "logoHover", options).unwrap();
        let v = backend.voice(voice).unwrap();
        assert_relative_eq!(v.envelope[1].time, 0.02);
        assert_relative_eq!(v.envelope[1].value, 0.5);
    }

    #[test]
    fn test_unknown_or_missing_effects_are_dropped() {
        let (mut bank, mut backend) = bank_with_backend();
        assert!(bank
            .play(&mut backend, "explosion", OneShotOptions::default())
            .is_none());
        // Registered but the asset 404s
        assert!(bank
            .play(&mut backend, "typing", OneShotOptions::default())
            .is_none());
        assert!(backend.voices().is_empty());
    }

    #[test]
    fn test_unloaded_effect_is_preloaded_for_next_time() {
        let mut backend = HeadlessBackend::new().with_asset("/assets/ui-pop-soft.mp3", 0.3);
        let mut bank = SfxBank::new(SfxDefinition::site_defaults());
        assert!(bank
            .play(&mut backend, "uiPop", OneShotOptions::default())
            .is_none());
        assert!(bank
            .play(&mut backend, "uiPop", OneShotOptions::default())
            .is_some());
    }

    #[test]
    fn test_hold_and_release() {
        let (mut bank, mut backend) = bank_with_backend();
        let voice = bank
            .hold(&mut backend, "logoHover", OneShotOptions::default())
            .unwrap();
        backend.advance(0.5);
        assert!(bank.release(&mut backend, voice));
        assert!(!bank.release(&mut backend, voice), "release is one-time");

        let v = backend.voice(voice).unwrap();
        assert_relative_eq!(v.stop_at.unwrap(), 0.65, epsilon = 1e-9);
        assert_relative_eq!(v.gain_at(0.5), 1.0);
        assert_relative_eq!(v.gain_at(0.575), 0.5, epsilon = 1e-5);
        assert_eq!(v.gain_at(0.7), 0.0);
    }

    #[test]
    fn test_release_after_natural_end_is_noop() {
        let (mut bank, mut backend) = bank_with_backend();
        let voice = bank
            .hold(&mut backend, "logoHover", OneShotOptions::default())
            .unwrap();
        backend.advance(2.0);
        assert!(!bank.release(&mut backend, voice));
        assert!(backend.voice(voice).unwrap().stop_at.is_none());
    }
}
