//! Platform audio output abstraction
//!
//! [`AudioBackend`] is everything the engine needs from the platform: a clock,
//! one gain stage per [`Channel`] feeding a master stage, decoded assets, and
//! voices (one playing instance of an asset). The browser implementation
//! schedules these on an `AudioContext`; [`crate::HeadlessBackend`] records
//! them against a manual clock.
//!
//! All times are in seconds on the backend's own clock ([`AudioBackend::now`]).

use crate::channel::Channel;
use crate::envelope::GainPoint;
use crate::error::Result;

/// Handle to a started voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// State of the platform output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Created but not allowed to produce sound yet (autoplay policy).
    Suspended,
    /// Producing sound.
    Running,
    /// Torn down; nothing will sound again.
    Closed,
}

/// Load state of an asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetState {
    /// Never requested.
    Unloaded,
    /// Fetch or decode in progress.
    Loading,
    /// Decoded and ready to start.
    Ready {
        /// Duration in seconds
        duration: f64,
    },
    /// Fetch or decode failed.
    Failed(String),
}

impl AssetState {
    /// Duration if the asset is decoded.
    pub fn duration(&self) -> Option<f64> {
        match self {
            AssetState::Ready { duration } => Some(*duration),
            _ => None,
        }
    }

    /// True once the asset can be started.
    pub fn is_ready(&self) -> bool {
        matches!(self, AssetState::Ready { .. })
    }
}

/// Parameters for [`AudioBackend::start_voice`].
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    /// Gain stage the voice feeds
    pub channel: Channel,
    /// Asset path or URL
    pub source: String,
    /// Start offset into the asset, in seconds
    pub offset: f64,
    /// Loop the asset until stopped
    pub looping: bool,
    /// Initial per-voice gain
    pub gain: f32,
    /// Optional per-voice automation, applied after `gain`
    pub envelope: Vec<GainPoint>,
}

impl VoiceSpec {
    /// A non-looping voice at full gain from the start of the asset.
    pub fn new(channel: Channel, source: impl Into<String>) -> Self {
        Self {
            channel,
            source: source.into(),
            offset: 0.0,
            looping: false,
            gain: 1.0,
            envelope: Vec::new(),
        }
    }

    /// Start `offset` seconds into the asset.
    pub fn at_offset(mut self, offset: f64) -> Self {
        self.offset = offset.max(0.0);
        self
    }

    /// Loop the asset.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Initial per-voice gain.
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Per-voice gain automation.
    pub fn with_envelope(mut self, envelope: Vec<GainPoint>) -> Self {
        self.envelope = envelope;
        self
    }
}

/// Platform audio output used by the engine.
///
/// Implementations own the platform graph: a master gain stage, one gain stage
/// per [`Channel`] connected to it, and any number of voices connected to a
/// channel stage. Scheduling calls are fire-and-forget; the engine keeps its
/// own model of scheduled gains and never reads them back.
pub trait AudioBackend {
    /// Current time on the output clock, in seconds.
    fn now(&self) -> f64;

    /// Current output state.
    fn output_state(&self) -> OutputState;

    /// Ask the platform to start producing sound.
    ///
    /// May complete asynchronously: `Ok` means the request was accepted, and
    /// [`AudioBackend::output_state`] reports `Running` once it has taken effect.
    fn resume(&mut self) -> Result<()>;

    /// Write the master gain immediately.
    fn set_master_gain(&mut self, gain: f32);

    /// Write a channel stage gain immediately, cancelling scheduled ramps.
    fn set_gain(&mut self, channel: Channel, value: f32);

    /// Cancel scheduled ramps on a channel stage, then schedule a linear ramp.
    fn ramp_gain(&mut self, channel: Channel, from: f32, to: f32, start_at: f64, duration: f64);

    /// Start fetching and decoding an asset. Repeated calls are no-ops.
    fn preload(&mut self, source: &str);

    /// Current load state of an asset.
    fn asset(&self, source: &str) -> AssetState;

    /// Start a decoded asset. Fails if the asset is not ready.
    fn start_voice(&mut self, spec: VoiceSpec) -> Result<VoiceId>;

    /// Cancel scheduled ramps on a voice, then ramp its gain linearly from the
    /// current value to `to`.
    fn ramp_voice(&mut self, voice: VoiceId, to: f32, start_at: f64, duration: f64);

    /// Stop a voice at time `at`. Unknown or finished voices are ignored.
    fn stop_voice(&mut self, voice: VoiceId, at: f64);
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn output_state(&self) -> OutputState {
        (**self).output_state()
    }

    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }

    fn set_master_gain(&mut self, gain: f32) {
        (**self).set_master_gain(gain)
    }

    fn set_gain(&mut self, channel: Channel, value: f32) {
        (**self).set_gain(channel, value)
    }

    fn ramp_gain(&mut self, channel: Channel, from: f32, to: f32, start_at: f64, duration: f64) {
        (**self).ramp_gain(channel, from, to, start_at, duration)
    }

    fn preload(&mut self, source: &str) {
        (**self).preload(source)
    }

    fn asset(&self, source: &str) -> AssetState {
        (**self).asset(source)
    }

    fn start_voice(&mut self, spec: VoiceSpec) -> Result<VoiceId> {
        (**self).start_voice(spec)
    }

    fn ramp_voice(&mut self, voice: VoiceId, to: f32, start_at: f64, duration: f64) {
        (**self).ramp_voice(voice, to, start_at, duration)
    }

    fn stop_voice(&mut self, voice: VoiceId, at: f64) {
        (**self).stop_voice(voice, at)
    }
}
