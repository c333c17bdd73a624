//! Engine configuration
//!
//! [`EngineConfig::default`] is the live site setup. Hosts can deserialize a
//! partial config (every field has a default) or adjust one with the `with_*`
//! builders, then [`EngineConfig::validate`] before building an engine.

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelMap};
use crate::envelope::VolumeCurve;
use crate::error::{AudioError, Result};
use crate::playlist::Track;
use crate::sfx::SfxDefinition;

/// Fade and ramp durations, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FadeTimings {
    /// Music fade-in when playback starts
    pub play_fade_in_ms: u32,
    /// Music fade-out when paused or stopped
    pub pause_fade_out_ms: u32,
    /// Each half of a track-change crossfade; 0 cuts immediately
    pub crossfade_ms: u32,
    /// Ambient fade-in
    pub ambient_fade_in_ms: u32,
    /// Ambient fade-out
    pub ambient_fade_out_ms: u32,
    /// Mute/unmute ramp for music and ambient
    pub mute_ramp_ms: u32,
    /// Mute/unmute ramp for sound effects
    pub sfx_mute_ramp_ms: u32,
}

impl Default for FadeTimings {
    fn default() -> Self {
        Self {
            play_fade_in_ms: 350,
            pause_fade_out_ms: 300,
            crossfade_ms: 600,
            ambient_fade_in_ms: 500,
            ambient_fade_out_ms: 400,
            mute_ramp_ms: 250,
            sfx_mute_ramp_ms: 150,
        }
    }
}

impl FadeTimings {
    /// Mute ramp for a channel, in seconds.
    pub fn mute_ramp(&self, channel: Channel) -> f64 {
        let ms = match channel {
            Channel::Sfx => self.sfx_mute_ramp_ms,
            Channel::Music | Channel::Ambient => self.mute_ramp_ms,
        };
        secs(ms)
    }
}

/// Milliseconds to seconds.
pub(crate) fn secs(ms: u32) -> f64 {
    f64::from(ms) / 1000.0
}

/// Section-scoped ambient loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmbientConfig {
    /// Looping asset; `None` disables the ambient channel entirely
    pub source: Option<String>,
    /// Section ids whose visibility turns the ambient loop on
    pub sections: Vec<String>,
    /// Fraction of a section that must be visible to count
    pub visibility_threshold: f64,
    /// Seconds away after which ambient restarts from the beginning
    pub restart_after_secs: f64,
    /// Resume-point persistence interval while playing
    pub persist_interval_secs: f64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            source: Some("/assets/ambience-witches-cauldron.mp3".to_string()),
            sections: vec![
                "wonderworks-intro".to_string(),
                "wonderworks-wrapper".to_string(),
            ],
            visibility_threshold: 0.3,
            restart_after_secs: 30.0 * 60.0,
            persist_interval_secs: 10.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Background music tracks, in order
    pub playlist: Vec<Track>,
    /// Ambient loop
    pub ambient: AmbientConfig,
    /// Named one-shot effects
    pub sfx: Vec<SfxDefinition>,
    /// Slider values for a fresh profile
    pub default_volumes: ChannelMap<f32>,
    /// Master stage gain
    pub master_gain: f32,
    /// Slider to gain mapping
    pub volume_curve: VolumeCurve,
    /// Ramp durations
    pub fades: FadeTimings,
    /// `prev` restarts the current track past this position
    pub prev_restart_threshold_secs: f64,
    /// Music resume-point persistence interval while playing
    pub music_persist_interval_secs: f64,
    /// Prefix for every settings key
    pub settings_prefix: String,
    /// Seed for shuffle; random when absent
    pub shuffle_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            playlist: (1..=3)
                .map(|n| {
                    Track::new(
                        format!("/assets/onnastick-bgm-{n}-copyright-kk.mp3"),
                        format!("BGM Track {n}"),
                    )
                })
                .collect(),
            ambient: AmbientConfig::default(),
            sfx: SfxDefinition::site_defaults(),
            default_volumes: ChannelMap {
                music: 0.25,
                ambient: 0.18,
                sfx: 0.22,
            },
            master_gain: crate::DEFAULT_MASTER_GAIN,
            volume_curve: VolumeCurve::Linear,
            fades: FadeTimings::default(),
            prev_restart_threshold_secs: 3.0,
            music_persist_interval_secs: 5.0,
            settings_prefix: crate::DEFAULT_SETTINGS_PREFIX.to_string(),
            shuffle_seed: None,
        }
    }
}

impl EngineConfig {
    /// Replace the playlist.
    pub fn with_playlist(mut self, tracks: Vec<Track>) -> Self {
        self.playlist = tracks;
        self
    }

    /// Replace the ambient setup.
    pub fn with_ambient(mut self, ambient: AmbientConfig) -> Self {
        self.ambient = ambient;
        self
    }

    /// Disable the ambient channel.
    pub fn without_ambient(mut self) -> Self {
        self.ambient.source = None;
        self
    }

    /// Replace the one-shot effects.
    pub fn with_sfx(mut self, sfx: Vec<SfxDefinition>) -> Self {
        self.sfx = sfx;
        self
    }

    /// Set the fresh-profile volume of one channel.
    pub fn with_default_volume(mut self, channel: Channel, volume: f32) -> Self {
        self.default_volumes[channel] = volume;
        self
    }

    /// Choose the slider to gain mapping.
    pub fn with_volume_curve(mut self, curve: VolumeCurve) -> Self {
        self.volume_curve = curve;
        self
    }

    /// Replace the ramp durations.
    pub fn with_fades(mut self, fades: FadeTimings) -> Self {
        self.fades = fades;
        self
    }

    /// Set the crossfade duration; 0 cuts immediately.
    pub fn with_crossfade_ms(mut self, ms: u32) -> Self {
        self.fades.crossfade_ms = ms;
        self
    }

    /// Use a different settings key prefix.
    pub fn with_settings_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings_prefix = prefix.into();
        self
    }

    /// Make shuffle deterministic.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        for (ch, volume) in self.default_volumes.iter() {
            if !(0.0..=1.0).contains(volume) {
                return Err(AudioError::config(format!(
                    "default {ch} volume {volume} is outside 0..=1"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.master_gain) {
            return Err(AudioError::config(format!(
                "master gain {} is outside 0..=1",
                self.master_gain
            )));
        }
        if !(0.0..=1.0).contains(&self.ambient.visibility_threshold) {
            return Err(AudioError::config(format!(
                "visibility threshold {} is outside 0..=1",
                self.ambient.visibility_threshold
            )));
        }
        let non_negative = [
            ("prevRestartThresholdSecs", self.prev_restart_threshold_secs),
            ("musicPersistIntervalSecs", self.music_persist_interval_secs),
            ("ambient.restartAfterSecs", self.ambient.restart_after_secs),
            ("ambient.persistIntervalSecs", self.ambient.persist_interval_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(AudioError::config(format!("{name} must be >= 0, got {value}")));
            }
        }
        if let Some(track) = self.playlist.iter().find(|t| t.source.is_empty()) {
            return Err(AudioError::config(format!(
                "track '{}' has no source",
                track.title
            )));
        }
        let mut names: Vec<&str> = self.sfx.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(AudioError::config(format!(
                "sound effect '{}' is defined twice",
                pair[0]
            )));
        }
        Ok(())
    }
}
