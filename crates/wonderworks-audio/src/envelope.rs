//! Gain envelopes and the channel fade controller
//!
//! Every audible gain change goes through a linear ramp rather than a jump.
//! [`FadeController`] keeps one pending ramp per channel stage: a new fade
//! replaces the old one (last call wins), so rapid slider or mute input never
//! piles up scheduled work.

use serde::{Deserialize, Serialize};

use crate::backend::AudioBackend;
use crate::channel::{Channel, ChannelMap};

/// Clamp a gain or slider value into `[0, 1]`. NaN maps to 0.
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Mapping between slider position and channel gain.
///
/// The same curve is used in both directions so a stored gain always redraws
/// the slider at the position that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCurve {
    /// gain = slider
    #[default]
    Linear,
    /// gain = slider², slider = √gain
    Quadratic,
}

impl VolumeCurve {
    /// Gain for a slider position.
    pub fn slider_to_gain(self, slider: f32) -> f32 {
        let s = clamp_unit(slider);
        match self {
            VolumeCurve::Linear => s,
            VolumeCurve::Quadratic => s * s,
        }
    }

    /// Slider position for a gain.
    pub fn gain_to_slider(self, gain: f32) -> f32 {
        let g = clamp_unit(gain);
        match self {
            VolumeCurve::Linear => g,
            VolumeCurve::Quadratic => g.sqrt(),
        }
    }
}

/// A point in a per-voice gain automation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainPoint {
    /// Backend time in seconds
    pub time: f64,
    /// Gain reached at `time`
    pub value: f32,
}

impl GainPoint {
    /// Create a point.
    pub fn new(time: f64, value: f32) -> Self {
        Self { time, value }
    }
}

/// A linear gain transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Gain at `start`
    pub from: f32,
    /// Gain at `start + duration` and afterwards
    pub to: f32,
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds; zero means a step
    pub duration: f64,
}

impl Envelope {
    /// Ramp from `from` to `to` starting at `start`.
    pub fn new(from: f32, to: f32, start: f64, duration: f64) -> Self {
        Self {
            from: clamp_unit(from),
            to: clamp_unit(to),
            start,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
        }
    }

    /// A constant gain from `start` on.
    pub fn constant(value: f32, start: f64) -> Self {
        Self::new(value, value, start, 0.0)
    }

    /// Time the ramp reaches `to`.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// True once `to` has been reached.
    pub fn is_complete(&self, now: f64) -> bool {
        now >= self.end()
    }

    /// Gain at time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        if t >= self.end() {
            return self.to;
        }
        if t <= self.start {
            return self.from;
        }
        let progress = ((t - self.start) / self.duration) as f32;
        clamp_unit(self.from + (self.to - self.from) * progress)
    }
}

/// Attack/release shape wrapped around a one-shot sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneShotEnvelope {
    /// Attack time in seconds
    pub attack: f64,
    /// Release time in seconds
    pub release: f64,
}

impl OneShotEnvelope {
    /// Build from millisecond values.
    pub fn from_millis(attack_ms: u32, release_ms: u32) -> Self {
        Self {
            attack: f64::from(attack_ms) / 1000.0,
            release: f64::from(release_ms) / 1000.0,
        }
    }

    /// Gain points for a sample of `duration` seconds starting at `start`.
    ///
    /// Attack and release shrink proportionally when together they exceed the
    /// sample length.
    pub fn points(&self, start: f64, duration: f64, peak: f32) -> Vec<GainPoint> {
        let peak = clamp_unit(peak);
        let total = self.attack + self.release;
        let (attack, release) = if total > duration && total > 0.0 {
            let scale = duration.max(0.0) / total;
            (self.attack * scale, self.release * scale)
        } else {
            (self.attack, self.release)
        };
        vec![
            GainPoint::new(start, 0.0),
            GainPoint::new(start + attack, peak),
            GainPoint::new(start + duration - release, peak),
            GainPoint::new(start + duration, 0.0),
        ]
    }

    /// Gain points for a held sound: attack only, release scheduled later.
    pub fn attack_points(&self, start: f64, peak: f32) -> Vec<GainPoint> {
        vec![
            GainPoint::new(start, 0.0),
            GainPoint::new(start + self.attack, clamp_unit(peak)),
        ]
    }
}

impl Default for OneShotEnvelope {
    fn default() -> Self {
        Self::from_millis(15, 150)
    }
}

/// Pending ramps and resting gains for the channel stages.
#[derive(Debug, Clone)]
pub struct FadeController {
    active: ChannelMap<Option<Envelope>>,
    resting: ChannelMap<f32>,
}

impl FadeController {
    /// Start with every stage resting at `initial`.
    pub fn new(initial: ChannelMap<f32>) -> Self {
        Self {
            active: ChannelMap::default(),
            resting: initial.map(|_, g| clamp_unit(*g)),
        }
    }

    /// Gain of a stage at `now`.
    pub fn gain_at(&self, channel: Channel, now: f64) -> f32 {
        match self.active[channel] {
            Some(env) => env.value_at(now),
            None => self.resting[channel],
        }
    }

    /// Gain the stage is heading to.
    pub fn target(&self, channel: Channel) -> f32 {
        self.active[channel].map_or(self.resting[channel], |env| env.to)
    }

    /// The ramp currently in flight on a stage.
    pub fn active(&self, channel: Channel, now: f64) -> Option<Envelope> {
        self.active[channel].filter(|env| !env.is_complete(now))
    }

    /// True while a ramp towards silence is in flight.
    pub fn is_fading_out(&self, channel: Channel, now: f64) -> bool {
        self.active(channel, now)
            .is_some_and(|env| env.to == 0.0 && env.from > 0.0)
    }

    /// Ramp a stage from its current gain to `to`, replacing any pending ramp.
    ///
    /// Repeating a fade towards the target already in flight (or already
    /// reached) schedules nothing.
    pub fn fade<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        channel: Channel,
        to: f32,
        duration: f64,
        now: f64,
    ) {
        let to = clamp_unit(to);
        let from = self.gain_at(channel, now);
        if self.target(channel) == to && (self.active(channel, now).is_some() || from == to) {
            return;
        }
        if duration <= 0.0 {
            self.set_immediate(backend, channel, to);
            return;
        }
        backend.ramp_gain(channel, from, to, now, duration);
        self.active[channel] = Some(Envelope::new(from, to, now, duration));
        self.resting[channel] = from;
    }

    /// Write a stage gain with no ramp, cancelling any pending one.
    pub fn set_immediate<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        channel: Channel,
        value: f32,
    ) {
        let value = clamp_unit(value);
        self.active[channel] = None;
        self.resting[channel] = value;
        backend.set_gain(channel, value);
    }

    /// Retire completed ramps; their end value becomes the resting gain.
    pub fn settle(&mut self, now: f64) {
        for channel in Channel::ALL {
            if let Some(env) = self.active[channel] {
                if env.is_complete(now) {
                    self.resting[channel] = env.to;
                    self.active[channel] = None;
                }
            }
        }
    }
}
