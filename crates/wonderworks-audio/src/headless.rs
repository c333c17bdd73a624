//! Deterministic in-memory backend
//!
//! `HeadlessBackend` keeps a manual clock and records every gain write, ramp
//! and voice the engine schedules, so engine behaviour can be driven and
//! inspected without an audio device. Assets are registered up front with a
//! known duration; anything else fails to load like a 404 would.

use std::collections::HashMap;

use crate::backend::{AssetState, AudioBackend, OutputState, VoiceId, VoiceSpec};
use crate::channel::{Channel, ChannelMap};
use crate::envelope::{Envelope, GainPoint};
use crate::error::{AudioError, Result};

/// How [`HeadlessBackend`] answers [`AudioBackend::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// The output is running as soon as `resume` returns.
    #[default]
    Immediate,
    /// The request is accepted; [`HeadlessBackend::finish_resume`] completes it.
    Deferred,
    /// The platform refuses.
    Fail,
}

#[derive(Debug, Clone)]
enum CatalogEntry {
    Available(f64),
    Pending(f64),
    Broken(String),
}

/// A voice recorded by [`HeadlessBackend`].
#[derive(Debug, Clone)]
pub struct HeadlessVoice {
    /// Voice handle
    pub id: VoiceId,
    /// Stage the voice feeds
    pub channel: Channel,
    /// Asset source
    pub source: String,
    /// Start offset into the asset
    pub offset: f64,
    /// Whether the voice loops
    pub looping: bool,
    /// Clock time the voice started
    pub started_at: f64,
    /// Scheduled stop time, if any
    pub stop_at: Option<f64>,
    /// Time the asset runs out (non-looping voices only)
    pub ends_at: Option<f64>,
    /// Automation points passed at start
    pub envelope: Vec<GainPoint>,
    base_gain: f32,
    ramp: Option<Envelope>,
}

impl HeadlessVoice {
    /// True if the voice produces sound at time `t`.
    pub fn is_sounding(&self, t: f64) -> bool {
        t >= self.started_at
            && self.stop_at.map_or(true, |stop| t < stop)
            && self.ends_at.map_or(true, |end| t < end)
    }

    /// Per-voice gain at time `t`.
    pub fn gain_at(&self, t: f64) -> f32 {
        match self.ramp {
            Some(ramp) if t >= ramp.start => ramp.value_at(t),
            _ => self.scheduled_gain_at(t),
        }
    }

    fn scheduled_gain_at(&self, t: f64) -> f32 {
        let Some(first) = self.envelope.first() else {
            return self.base_gain;
        };
        if t < first.time {
            return self.base_gain;
        }
        for pair in self.envelope.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t < b.time {
                return Envelope::new(a.value, b.value, a.time, b.time - a.time).value_at(t);
            }
        }
        self.envelope.last().map_or(self.base_gain, |p| p.value)
    }

    /// Playback position within the asset at time `t`.
    pub fn position_at(&self, t: f64, duration: f64) -> f64 {
        let pos = self.offset + (t - self.started_at).max(0.0);
        if self.looping && duration > 0.0 {
            pos % duration
        } else {
            pos.min(duration)
        }
    }
}

/// In-memory [`AudioBackend`] with a manual clock.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    clock: f64,
    state: OutputState,
    resume_mode: ResumeMode,
    resume_calls: usize,
    master_gain: f32,
    lanes: ChannelMap<Envelope>,
    ramps: Vec<(Channel, Envelope)>,
    catalog: HashMap<String, CatalogEntry>,
    loaded: HashMap<String, AssetState>,
    voices: Vec<HeadlessVoice>,
    next_voice: u64,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Suspended output at time zero with no assets.
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            state: OutputState::Suspended,
            resume_mode: ResumeMode::Immediate,
            resume_calls: 0,
            master_gain: 1.0,
            lanes: ChannelMap::from_fn(|_| Envelope::constant(1.0, 0.0)),
            ramps: Vec::new(),
            catalog: HashMap::new(),
            loaded: HashMap::new(),
            voices: Vec::new(),
            next_voice: 1,
        }
    }

    /// Register a decodable asset.
    pub fn with_asset(mut self, source: impl Into<String>, duration: f64) -> Self {
        self.add_asset(source, duration);
        self
    }

    /// Choose how `resume` behaves.
    pub fn with_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.resume_mode = mode;
        self
    }

    /// Register a decodable asset.
    pub fn add_asset(&mut self, source: impl Into<String>, duration: f64) {
        self.catalog
            .insert(source.into(), CatalogEntry::Available(duration));
    }

    /// Register an asset that fails to decode.
    pub fn fail_asset(&mut self, source: impl Into<String>, reason: impl Into<String>) {
        self.catalog
            .insert(source.into(), CatalogEntry::Broken(reason.into()));
    }

    /// Register an asset that stays `Loading` until [`Self::release_asset`].
    pub fn hold_asset(&mut self, source: impl Into<String>, duration: f64) {
        self.catalog
            .insert(source.into(), CatalogEntry::Pending(duration));
    }

    /// Finish decoding a held asset.
    pub fn release_asset(&mut self, source: &str) {
        if let Some(CatalogEntry::Pending(duration)) = self.catalog.get(source).cloned() {
            self.catalog
                .insert(source.to_string(), CatalogEntry::Available(duration));
            if matches!(self.loaded.get(source), Some(AssetState::Loading)) {
                self.loaded
                    .insert(source.to_string(), AssetState::Ready { duration });
            }
        }
    }

    /// Change how `resume` behaves.
    pub fn set_resume_mode(&mut self, mode: ResumeMode) {
        self.resume_mode = mode;
    }

    /// Complete a deferred resume.
    pub fn finish_resume(&mut self) {
        if self.state == OutputState::Suspended {
            self.state = OutputState::Running;
        }
    }

    /// Tear the output down.
    pub fn close(&mut self) {
        self.state = OutputState::Closed;
    }

    /// Move the clock forward.
    pub fn advance(&mut self, seconds: f64) {
        self.clock += seconds.max(0.0);
    }

    /// Set the clock.
    pub fn set_time(&mut self, t: f64) {
        self.clock = t;
    }

    /// Number of `resume` calls seen.
    pub fn resume_calls(&self) -> usize {
        self.resume_calls
    }

    /// Last master gain written.
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Channel stage gain at time `t`.
    pub fn gain_at(&self, channel: Channel, t: f64) -> f32 {
        self.lanes[channel].value_at(t)
    }

    /// Channel stage gain now.
    pub fn channel_gain(&self, channel: Channel) -> f32 {
        self.gain_at(channel, self.clock)
    }

    /// Every ramp scheduled on a channel stage, in call order.
    pub fn ramps(&self) -> &[(Channel, Envelope)] {
        &self.ramps
    }

    /// Every voice ever started, in start order.
    pub fn voices(&self) -> &[HeadlessVoice] {
        &self.voices
    }

    /// Look up a voice.
    pub fn voice(&self, id: VoiceId) -> Option<&HeadlessVoice> {
        self.voices.iter().find(|v| v.id == id)
    }

    /// Voices on a channel that are sounding now.
    pub fn sounding(&self, channel: Channel) -> Vec<&HeadlessVoice> {
        self.voices
            .iter()
            .filter(|v| v.channel == channel && v.is_sounding(self.clock))
            .collect()
    }

    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut HeadlessVoice> {
        self.voices.iter_mut().find(|v| v.id == id)
    }
}

impl AudioBackend for HeadlessBackend {
    fn now(&self) -> f64 {
        self.clock
    }

    fn output_state(&self) -> OutputState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        self.resume_calls += 1;
        match self.state {
            OutputState::Running => Ok(()),
            OutputState::Closed => Err(AudioError::backend("audio output is closed")),
            OutputState::Suspended => match self.resume_mode {
                ResumeMode::Immediate => {
                    self.state = OutputState::Running;
                    Ok(())
                }
                ResumeMode::Deferred => Ok(()),
                ResumeMode::Fail => Err(AudioError::backend("resume rejected by platform")),
            },
        }
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    fn set_gain(&mut self, channel: Channel, value: f32) {
        self.lanes[channel] = Envelope::constant(value, self.clock);
    }

    fn ramp_gain(&mut self, channel: Channel, from: f32, to: f32, start_at: f64, duration: f64) {
        let env = Envelope::new(from, to, start_at, duration);
        self.lanes[channel] = env;
        self.ramps.push((channel, env));
    }

    fn preload(&mut self, source: &str) {
        if self.loaded.contains_key(source) {
            return;
        }
        let state = match self.catalog.get(source) {
            Some(CatalogEntry::Available(duration)) => AssetState::Ready {
                duration: *duration,
            },
            Some(CatalogEntry::Pending(_)) => AssetState::Loading,
            Some(CatalogEntry::Broken(reason)) => AssetState::Failed(reason.clone()),
            None => AssetState::Failed("404 Not Found".to_string()),
        };
        self.loaded.insert(source.to_string(), state);
    }

    fn asset(&self, source: &str) -> AssetState {
        self.loaded
            .get(source)
            .cloned()
            .unwrap_or(AssetState::Unloaded)
    }

    fn start_voice(&mut self, spec: VoiceSpec) -> Result<VoiceId> {
        if self.state == OutputState::Closed {
            return Err(AudioError::backend("audio output is closed"));
        }
        let duration = match self.asset(&spec.source) {
            AssetState::Ready { duration } => duration,
            AssetState::Failed(reason) => return Err(AudioError::asset_load(spec.source, reason)),
            _ => return Err(AudioError::asset_load(spec.source, "asset not decoded")),
        };
        let id = VoiceId(self.next_voice);
        self.next_voice += 1;
        let ends_at = (!spec.looping).then(|| self.clock + (duration - spec.offset).max(0.0));
        self.voices.push(HeadlessVoice {
            id,
            channel: spec.channel,
            source: spec.source,
            offset: spec.offset,
            looping: spec.looping,
            started_at: self.clock,
            stop_at: None,
            ends_at,
            envelope: spec.envelope,
            base_gain: spec.gain,
            ramp: None,
        });
        Ok(id)
    }

    fn ramp_voice(&mut self, voice: VoiceId, to: f32, start_at: f64, duration: f64) {
        if let Some(v) = self.voice_mut(voice) {
            let from = v.gain_at(start_at);
            v.ramp = Some(Envelope::new(from, to, start_at, duration));
        }
    }

    fn stop_voice(&mut self, voice: VoiceId, at: f64) {
        if let Some(v) = self.voice_mut(voice) {
            let at = v.stop_at.map_or(at, |prev| prev.min(at));
            v.stop_at = Some(at);
        }
    }
}
