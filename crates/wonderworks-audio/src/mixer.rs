//! Channel mixer
//!
//! Owns the volume and mute flag of each channel and is the only writer of the
//! channel gain stages. Output gain is `0` when muted, otherwise the slider
//! volume mapped through the configured [`VolumeCurve`].

use tracing::debug;

use crate::backend::AudioBackend;
use crate::channel::{Channel, ChannelMap};
use crate::envelope::{clamp_unit, FadeController, VolumeCurve};

/// Stored state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelState {
    /// Slider value in `[0, 1]`
    pub volume: f32,
    /// User mute flag
    pub muted: bool,
}

/// Per-channel gain stages.
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    channels: ChannelMap<ChannelState>,
    curve: VolumeCurve,
    master_gain: f32,
    mute_ramps: ChannelMap<f64>,
    fades: FadeController,
}

impl ChannelMixer {
    /// Build a mixer from restored settings. Nothing is written to the
    /// backend until [`ChannelMixer::apply_all`].
    pub fn new(
        volumes: ChannelMap<f32>,
        muted: ChannelMap<bool>,
        curve: VolumeCurve,
        master_gain: f32,
        mute_ramps: ChannelMap<f64>,
    ) -> Self {
        let channels = ChannelMap::from_fn(|ch| ChannelState {
            volume: clamp_unit(volumes[ch]),
            muted: muted[ch],
        });
        let output = channels.map(|_, s| output_of(curve, s));
        Self {
            channels,
            curve,
            master_gain: clamp_unit(master_gain),
            mute_ramps,
            fades: FadeController::new(output),
        }
    }

    /// Write the master gain and every stage gain immediately.
    pub fn apply_all<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        backend.set_master_gain(self.master_gain);
        for ch in Channel::ALL {
            let gain = self.output_gain(ch);
            self.fades.set_immediate(backend, ch, gain);
        }
    }

    /// Stored state of a channel.
    pub fn state(&self, channel: Channel) -> ChannelState {
        self.channels[channel]
    }

    /// Slider value of a channel.
    pub fn volume(&self, channel: Channel) -> f32 {
        self.channels[channel].volume
    }

    /// Mute flag of a channel.
    pub fn is_muted(&self, channel: Channel) -> bool {
        self.channels[channel].muted
    }

    /// Curve used to map sliders to gain.
    pub fn curve(&self) -> VolumeCurve {
        self.curve
    }

    /// Resting output gain of a channel.
    pub fn output_gain(&self, channel: Channel) -> f32 {
        output_of(self.curve, &self.channels[channel])
    }

    /// Stage gain at `now`, including any ramp in flight.
    pub fn gain_at(&self, channel: Channel, now: f64) -> f32 {
        self.fades.gain_at(channel, now)
    }

    /// Store a new slider value and, unless muted, apply it immediately.
    ///
    /// Returns `false` if the clamped value equals the stored one.
    pub fn set_volume<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        channel: Channel,
        value: f32,
    ) -> bool {
        let volume = clamp_unit(value);
        if self.channels[channel].volume == volume {
            return false;
        }
        self.channels[channel].volume = volume;
        if !self.channels[channel].muted {
            let gain = self.output_gain(channel);
            self.fades.set_immediate(backend, channel, gain);
        }
        true
    }

    /// Store a mute flag and ramp the stage to silence or back to the stored
    /// volume. Returns `false` if the flag was already set.
    pub fn set_muted<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        channel: Channel,
        muted: bool,
        now: f64,
    ) -> bool {
        if self.channels[channel].muted == muted {
            return false;
        }
        self.channels[channel].muted = muted;
        let gain = self.output_gain(channel);
        debug!(%channel, muted, gain, "mute ramp");
        self.fades
            .fade(backend, channel, gain, self.mute_ramps[channel], now);
        true
    }

    /// Store a new slider value and ramp to it over `duration` seconds.
    ///
    /// While muted only the stored value changes. Returns `false` if nothing
    /// changed.
    pub fn fade_to<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        channel: Channel,
        value: f32,
        duration: f64,
        now: f64,
    ) -> bool {
        let volume = clamp_unit(value);
        let changed = self.channels[channel].volume != volume;
        self.channels[channel].volume = volume;
        if !self.channels[channel].muted {
            let gain = self.output_gain(channel);
            self.fades.fade(backend, channel, gain, duration, now);
        }
        changed
    }

    /// Retire completed ramps.
    pub fn settle(&mut self, now: f64) {
        self.fades.settle(now);
    }
}

fn output_of(curve: VolumeCurve, state: &ChannelState) -> f32 {
    if state.muted {
        0.0
    } else {
        curve.slider_to_gain(state.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use approx::assert_relative_eq;

    fn mixer(curve: VolumeCurve) -> ChannelMixer {
        ChannelMixer::new(
            ChannelMap {
                music: 0.25,
                ambient: 0.18,
                sfx: 0.22,
            },
            ChannelMap::default(),
            curve,
            0.9,
            ChannelMap {
                music: 0.25,
                ambient: 0.25,
                sfx: 0.15,
            },
        )
    }

    #[test]
    fn test_apply_all_writes_every_stage() {
        let mut backend = HeadlessBackend::new();
        let mut mixer = mixer(VolumeCurve::Linear);
        mixer.apply_all(&mut backend);
        assert_relative_eq!(backend.master_gain(), 0.9);
        assert_relative_eq!(backend.channel_gain(Channel::Music), 0.25);
        assert_relative_eq!(backend.channel_gain(Channel::Ambient), 0.18);
        assert_relative_eq!(backend.channel_gain(Channel::Sfx), 0.22);
    }

    #[test]
    fn test_set_volume_clamps() {
        let mut backend = HeadlessBackend::new();
        let mut mixer = mixer(VolumeCurve::Linear);
        mixer.set_volume(&mut backend, Channel::Music, -0.5);
        assert_eq!(mixer.volume(Channel::Music), 0.0);
        mixer.set_volume(&mut backend, Channel::Music, 1.7);
        assert_eq!(mixer.volume(Channel::Music), 1.0);
        assert_eq!(backend.channel_gain(Channel::Music), 1.0);
        assert!(!mixer.set_volume(&mut backend, Channel::Music, 3.0));
    }

    #[test]
    fn test_mute_is_idempotent_and_restores_volume() {
        let mut backend = HeadlessBackend::new();
        let mut mixer = mixer(VolumeCurve::Linear);
        mixer.apply_all(&mut backend);
        mixer.set_volume(&mut backend, Channel::Sfx, 0.6);

        assert!(mixer.set_muted(&mut backend, Channel::Sfx, true, 0.0));
        assert!(!mixer.set_muted(&mut backend, Channel::Sfx, true, 0.05));
        assert_relative_eq!(backend.gain_at(Channel::Sfx, 0.15), 0.0);
        mixer.settle(1.0);
        assert_eq!(mixer.gain_at(Channel::Sfx, 1.0), 0.0);

        // Volume changes while muted are stored, not heard
        mixer.set_volume(&mut backend, Channel::Sfx, 0.7);
        assert_eq!(backend.gain_at(Channel::Sfx, 1.0), 0.0);

        mixer.set_muted(&mut backend, Channel::Sfx, false, 2.0);
        assert_relative_eq!(backend.gain_at(Channel::Sfx, 2.15), 0.7);
        assert_relative_eq!(mixer.volume(Channel::Sfx), 0.7);
    }

    #[test]
    fn test_quadratic_curve_applies_to_output() {
        let mut backend = HeadlessBackend::new();
        let mut mixer = mixer(VolumeCurve::Quadratic);
        mixer.set_volume(&mut backend, Channel::Music, 0.5);
        assert_relative_eq!(backend.channel_gain(Channel::Music), 0.25);
        assert_relative_eq!(mixer.volume(Channel::Music), 0.5);
    }

    #[test]
    fn test_fade_to_ramps_and_stores() {
        let mut backend = HeadlessBackend::new();
        let mut mixer = mixer(VolumeCurve::Linear);
        mixer.apply_all(&mut backend);
        mixer.fade_to(&mut backend, Channel::Ambient, 0.0, 2.0, 0.0);
        assert_relative_eq!(backend.gain_at(Channel::Ambient, 1.0), 0.09, epsilon = 1e-6);
        assert_eq!(mixer.volume(Channel::Ambient), 0.0);
        assert_eq!(mixer.gain_at(Channel::Ambient, 2.0), 0.0);
    }
}
