//! The audio engine
//!
//! [`AudioEngine`] owns every piece of audio state: the mixer, the music
//! transport, the ambient loop, the effect bank, the unlock gate and the
//! visibility router. It is an ordinary value: construct one per page (or per
//! test), drive it with user intents and [`AudioEngine::update`] ticks, and
//! read it back with [`AudioEngine::state`].
//!
//! Public operations never fail. Invalid input is clamped or normalized,
//! platform refusals become deferred intent, and missing assets or broken
//! storage are logged while the engine carries on with what it has.

use serde::Serialize;
use tracing::{debug, info};

use crate::ambient::AmbientChannel;
use crate::backend::{AudioBackend, VoiceId};
use crate::channel::{Channel, ChannelMap};
use crate::config::{secs, EngineConfig};
use crate::error::Result;
use crate::events::{EngineEvent, EventBus, ListenerId};
use crate::mixer::ChannelMixer;
use crate::playlist::TrackInfo;
use crate::settings::{PersistedSettings, Persistence, SettingKeys, SettingsStore};
use crate::sfx::{OneShotOptions, SfxBank};
use crate::transport::MusicTransport;
use crate::unlock::{GateState, Gesture, UnlockGate};
use crate::visibility::{AmbientDirective, VisibilityRouter};

/// Everything a channel transport may touch while handling one operation.
pub(crate) struct Ctx<'a, B: ?Sized> {
    pub backend: &'a mut B,
    pub persistence: &'a mut Persistence,
    pub events: &'a mut Vec<EngineEvent>,
    pub muted: bool,
    pub unlocked: bool,
}

/// Snapshot of engine state for UI redraws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Music is sounding
    pub playing: bool,
    /// Selected playlist index
    pub current_track_index: usize,
    /// Playlist length
    pub total_tracks: usize,
    /// Selected track details
    pub track: Option<TrackInfo>,
    /// Slider value per channel
    pub volumes: ChannelMap<f32>,
    /// Mute flag per channel
    pub muted: ChannelMap<bool>,
    /// Shuffle mode
    pub shuffle: bool,
    /// Repeat mode
    pub repeat: bool,
    /// Ambient master switch
    pub ambient_enabled: bool,
    /// Ambient loop is sounding
    pub ambient_playing: bool,
    /// The autoplay gate has opened
    pub unlocked: bool,
    /// Playback is wanted but held back by the autoplay gate
    pub awaiting_gesture: bool,
}

/// Site audio engine over a platform backend.
pub struct AudioEngine<B: AudioBackend> {
    backend: B,
    config: EngineConfig,
    persistence: Persistence,
    mixer: ChannelMixer,
    music: MusicTransport,
    ambient: AmbientChannel,
    sfx: SfxBank,
    gate: UnlockGate,
    router: VisibilityRouter,
    bus: EventBus,
    outbox: Vec<EngineEvent>,
    initialized: bool,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Build an engine, restoring persisted settings from `store`.
    ///
    /// Nothing touches the backend until [`AudioEngine::init`] (called
    /// implicitly by the first operation). Fails only for an invalid config.
    pub fn new(backend: B, store: Box<dyn SettingsStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let persistence = Persistence::new(store, SettingKeys::new(config.settings_prefix.clone()));
        let defaults = PersistedSettings::with_volumes(config.default_volumes);
        let settings = persistence.load(&defaults);

        let mixer = ChannelMixer::new(
            settings.volumes,
            settings.muted,
            config.volume_curve,
            config.master_gain,
            ChannelMap::from_fn(|ch| config.fades.mute_ramp(ch)),
        );
        let mut music = MusicTransport::new(&config);
        music.restore(
            settings.music_index,
            settings.music_position,
            settings.shuffle,
            settings.repeat,
        );
        let mut ambient = AmbientChannel::new(&config);
        ambient.restore(settings.ambient_enabled, settings.ambient_position);
        let router = VisibilityRouter::new(
            config.ambient.sections.iter().cloned(),
            config.ambient.visibility_threshold,
        );

        Ok(Self {
            backend,
            sfx: SfxBank::new(config.sfx.iter().cloned()),
            config,
            persistence,
            mixer,
            music,
            ambient,
            gate: UnlockGate::new(),
            router,
            bus: EventBus::new(),
            outbox: Vec::new(),
            initialized: false,
        })
    }

    /// Build the mixing graph and start decoding assets. Idempotent.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.mixer.apply_all(&mut self.backend);
        for track in self.music.playlist().tracks() {
            self.backend.preload(&track.source);
        }
        if let Some(source) = self.ambient.source() {
            self.backend.preload(source);
        }
        self.sfx.preload_all(&mut self.backend);
        info!(
            tracks = self.music.playlist().len(),
            index = self.music.playlist().current_index(),
            "audio engine initialized"
        );
    }

    /// Poll platform completions: finished resumes, decoded assets, ramps
    /// that completed, track ends, crossfade hand-overs and periodic
    /// persistence. Call on a short interval (around 100 ms).
    pub fn update(&mut self) {
        self.init();
        if self.gate.poll(&self.backend) {
            self.on_unlocked();
        }
        let now = self.backend.now();
        self.mixer.settle(now);
        self.with_music(|music, ctx| music.update(ctx));
        self.with_ambient(|ambient, ctx| ambient.update(ctx));
    }

    /// Feed a user gesture to the autoplay gate. Returns `true` if this
    /// gesture unlocked audio.
    pub fn unlock(&mut self, gesture: Gesture) -> bool {
        self.init();
        if self.gate.on_gesture(&mut self.backend, gesture) {
            self.on_unlocked();
            return true;
        }
        false
    }

    /// Gate progress.
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// True once audio is allowed.
    pub fn is_unlocked(&self) -> bool {
        self.gate.is_unlocked()
    }

    fn on_unlocked(&mut self) {
        self.outbox.push(EngineEvent::Unlocked);
        self.with_music(|music, ctx| music.flush_intent(ctx));
        self.with_ambient(|ambient, ctx| ambient.flush_intent(ctx));
    }

    // ---- music ----

    /// Play the selected track (deferred while locked or muted).
    pub fn play(&mut self) {
        self.with_music(|music, ctx| music.play(ctx));
    }

    /// Pause, keeping the position.
    pub fn pause(&mut self) {
        self.with_music(|music, ctx| music.pause(ctx));
    }

    /// Play if paused, pause if playing. Returns the new intent.
    pub fn toggle_play(&mut self) -> bool {
        if self.music.is_playing() || self.music.wants_play() {
            self.pause();
            false
        } else {
            self.play();
            true
        }
    }

    /// Pause and rewind.
    pub fn stop(&mut self) {
        self.with_music(|music, ctx| music.stop(ctx));
    }

    /// Next track (random when shuffling; stops at the end without repeat).
    pub fn next(&mut self) {
        self.with_music(|music, ctx| music.next(ctx));
    }

    /// Previous track, or restart the current one past the threshold.
    pub fn prev(&mut self) {
        self.with_music(|music, ctx| music.prev(ctx));
    }

    /// Select a track, normalizing the index into range, and pause there.
    pub fn load(&mut self, index: i64) {
        self.with_music(|music, ctx| music.load(ctx, index));
    }

    /// Jump within the selected track.
    pub fn seek(&mut self, seconds: f64) {
        self.with_music(|music, ctx| music.seek(ctx, seconds));
    }

    /// Set shuffle mode.
    pub fn set_shuffle(&mut self, on: bool) {
        self.with_music(|music, ctx| music.set_shuffle(ctx, on));
    }

    /// Flip shuffle mode and return the new flag.
    pub fn toggle_shuffle(&mut self) -> bool {
        let on = !self.music.playlist().shuffle;
        self.set_shuffle(on);
        on
    }

    /// Set repeat mode.
    pub fn set_repeat(&mut self, on: bool) {
        self.with_music(|music, ctx| music.set_repeat(ctx, on));
    }

    /// Flip repeat mode and return the new flag.
    pub fn toggle_repeat(&mut self) -> bool {
        let on = !self.music.playlist().repeat;
        self.set_repeat(on);
        on
    }

    /// Selected track details.
    pub fn current_track(&self) -> Option<TrackInfo> {
        self.music.track_info(&self.backend)
    }

    // ---- ambient ----

    /// Request the ambient loop.
    pub fn play_ambient(&mut self) {
        self.with_ambient(|ambient, ctx| ambient.play(ctx));
    }

    /// Pause the ambient loop, keeping its position.
    pub fn pause_ambient(&mut self) {
        self.with_ambient(|ambient, ctx| ambient.pause(ctx));
    }

    /// Ambient master switch.
    pub fn set_ambient_enabled(&mut self, enabled: bool) {
        self.with_ambient(|ambient, ctx| ambient.set_enabled(ctx, enabled));
    }

    /// Flip the ambient master switch and return the new flag.
    pub fn toggle_ambient(&mut self) -> bool {
        let enabled = !self.ambient.is_enabled();
        self.set_ambient_enabled(enabled);
        enabled
    }

    /// Ambient master switch state.
    pub fn is_ambient_enabled(&self) -> bool {
        self.ambient.is_enabled()
    }

    /// True while the ambient loop sounds.
    pub fn is_ambient_playing(&self) -> bool {
        self.ambient.is_playing()
    }

    /// Report whether a page section is visible.
    pub fn report_visibility(&mut self, section: &str, visible: bool) {
        let directive = self.router.report(section, visible);
        self.apply_directive(directive);
    }

    /// Report a section's visible fraction (IntersectionObserver ratio).
    pub fn report_intersection(&mut self, section: &str, ratio: f64) {
        let directive = self.router.report_ratio(section, ratio);
        self.apply_directive(directive);
    }

    /// Section ids that drive the ambient loop.
    pub fn ambient_sections(&self) -> impl Iterator<Item = &str> {
        self.router.sections()
    }

    /// Visible fraction a section needs.
    pub fn visibility_threshold(&self) -> f64 {
        self.router.threshold()
    }

    fn apply_directive(&mut self, directive: Option<AmbientDirective>) {
        match directive {
            Some(AmbientDirective::Play) => self.play_ambient(),
            Some(AmbientDirective::Pause) => self.pause_ambient(),
            None => {}
        }
    }

    // ---- sound effects ----

    /// Play a named effect. Dropped before unlock, while muted, or if the
    /// asset is not decoded.
    pub fn play_one_shot(&mut self, name: &str) -> Option<VoiceId> {
        self.play_one_shot_with(name, OneShotOptions::default())
    }

    /// Play a named effect with overrides.
    pub fn play_one_shot_with(&mut self, name: &str, options: OneShotOptions) -> Option<VoiceId> {
        if !self.sfx_allowed(name) {
            return None;
        }
        self.sfx.play(&mut self.backend, name, options)
    }

    /// Play a named effect that the caller will release (hover sounds).
    pub fn hold_one_shot(&mut self, name: &str) -> Option<VoiceId> {
        if !self.sfx_allowed(name) {
            return None;
        }
        self.sfx
            .hold(&mut self.backend, name, OneShotOptions::default())
    }

    /// Fade out a held effect.
    pub fn release_held(&mut self, voice: VoiceId) -> bool {
        self.sfx.release(&mut self.backend, voice)
    }

    fn sfx_allowed(&mut self, name: &str) -> bool {
        self.init();
        if !self.gate.is_unlocked() {
            debug!(effect = name, "sound effect dropped, audio locked");
            return false;
        }
        if self.mixer.is_muted(Channel::Sfx) {
            debug!(effect = name, "sound effect dropped, muted");
            return false;
        }
        true
    }

    // ---- mixer ----

    /// Set a channel's slider value (clamped to `[0, 1]`).
    pub fn set_volume(&mut self, channel: Channel, volume: f32) {
        self.init();
        if self.mixer.set_volume(&mut self.backend, channel, volume) {
            self.volume_changed(channel);
        }
    }

    /// A channel's slider value.
    pub fn volume(&self, channel: Channel) -> f32 {
        self.mixer.volume(channel)
    }

    /// Step a channel's slider value and return the new value.
    pub fn nudge_volume(&mut self, channel: Channel, delta: f32) -> f32 {
        let target = self.mixer.volume(channel) + delta;
        self.set_volume(channel, target);
        self.mixer.volume(channel)
    }

    /// Ramp a channel to a new slider value over `duration_ms`.
    pub fn fade_to(&mut self, channel: Channel, volume: f32, duration_ms: u32) {
        self.init();
        let now = self.backend.now();
        if self
            .mixer
            .fade_to(&mut self.backend, channel, volume, secs(duration_ms), now)
        {
            self.volume_changed(channel);
        }
    }

    fn volume_changed(&mut self, channel: Channel) {
        let volume = self.mixer.volume(channel);
        self.persistence.write_volume(channel, volume);
        self.outbox.push(EngineEvent::VolumeChanged { channel, volume });
        self.flush_events();
    }

    /// Mute or unmute a channel. Unmuting replays deferred intent.
    pub fn set_muted(&mut self, channel: Channel, muted: bool) {
        self.init();
        let now = self.backend.now();
        if !self.mixer.set_muted(&mut self.backend, channel, muted, now) {
            return;
        }
        self.persistence.write_muted(channel, muted);
        self.outbox.push(EngineEvent::MuteChanged { channel, muted });
        match (channel, muted) {
            (Channel::Music, false) => self.with_music(|music, ctx| music.flush_intent(ctx)),
            (Channel::Ambient, false) => self.with_ambient(|ambient, ctx| ambient.flush_intent(ctx)),
            _ => self.flush_events(),
        }
    }

    /// A channel's mute flag.
    pub fn is_muted(&self, channel: Channel) -> bool {
        self.mixer.is_muted(channel)
    }

    /// Flip a channel's mute flag and return the new flag.
    pub fn toggle_muted(&mut self, channel: Channel) -> bool {
        let muted = !self.mixer.is_muted(channel);
        self.set_muted(channel, muted);
        muted
    }

    // ---- state and observers ----

    /// Snapshot for UI redraws.
    pub fn state(&self) -> EngineSnapshot {
        let playlist = self.music.playlist();
        EngineSnapshot {
            playing: self.music.is_playing(),
            current_track_index: playlist.current_index(),
            total_tracks: playlist.len(),
            track: self.current_track(),
            volumes: ChannelMap::from_fn(|ch| self.mixer.volume(ch)),
            muted: ChannelMap::from_fn(|ch| self.mixer.is_muted(ch)),
            shuffle: playlist.shuffle,
            repeat: playlist.repeat,
            ambient_enabled: self.ambient.is_enabled(),
            ambient_playing: self.ambient.is_playing(),
            unlocked: self.gate.is_unlocked(),
            awaiting_gesture: !self.gate.is_unlocked()
                && (self.music.wants_play() || self.ambient.wants_play()),
        }
    }

    /// Register a listener for [`EngineEvent`]s.
    pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    /// Remove a listener. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The platform backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The platform backend, mutably (hosts use this to drive test clocks).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn with_music(&mut self, op: impl FnOnce(&mut MusicTransport, &mut Ctx<'_, B>)) {
        self.init();
        let mut ctx = Ctx {
            backend: &mut self.backend,
            persistence: &mut self.persistence,
            events: &mut self.outbox,
            muted: self.mixer.is_muted(Channel::Music),
            unlocked: self.gate.is_unlocked(),
        };
        op(&mut self.music, &mut ctx);
        self.flush_events();
    }

    fn with_ambient(&mut self, op: impl FnOnce(&mut AmbientChannel, &mut Ctx<'_, B>)) {
        self.init();
        let mut ctx = Ctx {
            backend: &mut self.backend,
            persistence: &mut self.persistence,
            events: &mut self.outbox,
            muted: self.mixer.is_muted(Channel::Ambient),
            unlocked: self.gate.is_unlocked(),
        };
        op(&mut self.ambient, &mut ctx);
        self.flush_events();
    }

    fn flush_events(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        self.bus.dispatch(self.outbox.drain(..));
    }
}

impl<B: AudioBackend + std::fmt::Debug> std::fmt::Debug for AudioEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("backend", &self.backend)
            .field("mixer", &self.mixer)
            .field("music", &self.music)
            .field("ambient", &self.ambient)
            .field("gate", &self.gate)
            .field("router", &self.router)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
