//! Music playlist transport
//!
//! State machine for the background-music channel:
//!
//! ```text
//!            load / stop / end of playlist
//!   Idle ─────────────► Paused ◄──────────────┐
//!                        │  ▲                  │
//!                 play   │  │ pause            │
//!                        ▼  │                  │
//!                      Playing ── next/prev ──► Crossfading
//!                        ▲                         │
//!                        └──── switch_at reached ──┘
//! ```
//!
//! A play request that cannot be honoured yet (gate locked, channel muted,
//! asset still decoding) is kept as deferred intent and replayed by the engine
//! or by [`MusicTransport`]'s polling once the obstacle is gone. Each transport
//! owns at most one sounding voice; outgoing voices are faded and scheduled to
//! stop before they are forgotten, so two tracks never play at full level.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::backend::{AssetState, AudioBackend, VoiceId, VoiceSpec};
use crate::channel::Channel;
use crate::config::{secs, EngineConfig};
use crate::engine::Ctx;
use crate::events::EngineEvent;
use crate::playlist::{Advance, Playlist, Track, TrackInfo};

/// Gap kept before the end of the asset when resuming from a stored position.
const END_GUARD_SECS: f64 = 0.1;

/// Fade used when seeking inside a playing track.
const SEEK_FADE_SECS: f64 = 0.05;

/// Music transport state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportState {
    /// Empty playlist, nothing to play.
    Idle,
    /// A track is selected but silent.
    Paused,
    /// The selected track is sounding.
    Playing,
    /// The previous track is fading out; the selected one starts at `switch_at`.
    Crossfading {
        /// Backend time the incoming track starts
        switch_at: f64,
    },
}

#[derive(Debug, Clone, Copy)]
struct Session {
    voice: VoiceId,
    offset: f64,
    started_at: f64,
    duration: f64,
}

impl Session {
    fn position(&self, now: f64) -> f64 {
        (self.offset + (now - self.started_at).max(0.0)).min(self.duration)
    }

    fn ends_at(&self) -> f64 {
        self.started_at + (self.duration - self.offset).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    fade_in: f64,
    fade_out: f64,
    crossfade: f64,
    prev_restart: f64,
    persist_every: f64,
}

/// Playlist transport for the music channel.
#[derive(Debug, Clone)]
pub struct MusicTransport {
    playlist: Playlist,
    state: TransportState,
    session: Option<Session>,
    position: f64,
    wants_play: bool,
    reported_playing: bool,
    last_persist: f64,
    /// Backend time the last outgoing voice falls silent
    fading_until: f64,
    timings: Timings,
    rng: StdRng,
}

impl MusicTransport {
    /// Transport over the configured playlist, paused at the first track.
    pub fn new(config: &EngineConfig) -> Self {
        let playlist = Playlist::new(config.playlist.clone());
        let state = if playlist.is_empty() {
            TransportState::Idle
        } else {
            TransportState::Paused
        };
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            playlist,
            state,
            session: None,
            position: 0.0,
            wants_play: false,
            reported_playing: false,
            last_persist: 0.0,
            fading_until: 0.0,
            timings: Timings {
                fade_in: secs(config.fades.play_fade_in_ms),
                fade_out: secs(config.fades.pause_fade_out_ms),
                crossfade: secs(config.fades.crossfade_ms),
                prev_restart: config.prev_restart_threshold_secs,
                persist_every: config.music_persist_interval_secs,
            },
            rng,
        }
    }

    /// Apply persisted index, position and modes without side effects.
    pub(crate) fn restore(&mut self, index: usize, position: f64, shuffle: bool, repeat: bool) {
        let restored = self.playlist.select(index as i64);
        if restored != index {
            debug!(index, "stored track index out of range, normalized");
            self.position = 0.0;
        } else {
            self.position = position;
        }
        self.playlist.shuffle = shuffle;
        self.playlist.repeat = repeat;
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// The playlist.
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// True while music is sounding (including a crossfade in progress).
    pub fn is_playing(&self) -> bool {
        matches!(
            self.state,
            TransportState::Playing | TransportState::Crossfading { .. }
        )
    }

    /// True if a play request is waiting on the gate, mute or decoding.
    pub fn wants_play(&self) -> bool {
        self.wants_play
    }

    /// Position in the selected track at `now`.
    pub fn position(&self, now: f64) -> f64 {
        match (&self.state, &self.session) {
            (TransportState::Playing, Some(session)) => session.position(now),
            _ => self.position,
        }
    }

    /// Display snapshot of the selected track.
    pub fn track_info<B: AudioBackend + ?Sized>(&self, backend: &B) -> Option<TrackInfo> {
        let track = self.playlist.current()?;
        Some(TrackInfo {
            index: self.playlist.current_index(),
            total: self.playlist.len(),
            title: track.title.clone(),
            source: track.source.clone(),
            position_secs: self.position(backend.now()),
            duration_secs: backend.asset(&track.source).duration(),
            playing: self.is_playing(),
        })
    }

    fn current_track(&self) -> Option<Track> {
        self.playlist.current().cloned()
    }

    /// Select a track and leave it paused at the start.
    pub(crate) fn load<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, index: i64) {
        if self.playlist.is_empty() {
            return;
        }
        self.silence(ctx);
        self.wants_play = false;
        self.state = TransportState::Paused;
        self.select(ctx, index);
        self.set_playing(ctx, false);
        self.persist(ctx);
    }

    /// Start the selected track, or record the intent to.
    pub(crate) fn play<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if self.playlist.is_empty() {
            return;
        }
        self.wants_play = true;
        if self.is_playing() {
            return;
        }
        if !ctx.unlocked {
            debug!("music play deferred until unlock");
            return;
        }
        if ctx.muted {
            debug!("music play deferred while muted");
            return;
        }
        self.try_start(ctx);
    }

    /// Replay deferred intent once playing is allowed.
    pub(crate) fn flush_intent<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if self.wants_play && self.state == TransportState::Paused && ctx.unlocked && !ctx.muted {
            self.try_start(ctx);
        }
    }

    /// Fade out and keep the position.
    pub(crate) fn pause<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        self.wants_play = false;
        if !self.is_playing() {
            return;
        }
        self.silence(ctx);
        self.state = TransportState::Paused;
        self.set_playing(ctx, false);
        self.persist(ctx);
        debug!(position = self.position, "music paused");
    }

    /// Fade out and rewind to the start of the selected track.
    pub(crate) fn stop<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        self.wants_play = false;
        if self.playlist.is_empty() {
            return;
        }
        self.silence(ctx);
        self.position = 0.0;
        self.state = TransportState::Paused;
        self.set_playing(ctx, false);
        self.persist(ctx);
    }

    /// Advance to the following track.
    pub(crate) fn next<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if self.playlist.is_empty() {
            return;
        }
        match self.playlist.next_index(&mut self.rng) {
            Advance::To(index) => self.change_track(ctx, index),
            Advance::End => self.end_of_playlist(ctx),
        }
    }

    /// Restart the current track past the threshold, otherwise step back.
    pub(crate) fn prev<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if self.playlist.is_empty() {
            return;
        }
        let now = ctx.backend.now();
        if self.position(now) > self.timings.prev_restart {
            self.seek(ctx, 0.0);
            return;
        }
        let index = self.playlist.prev_index();
        self.change_track(ctx, index);
    }

    /// Jump within the selected track.
    pub(crate) fn seek<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, seconds: f64) {
        let Some(track) = self.current_track() else {
            return;
        };
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(duration) = ctx.backend.asset(&track.source).duration() {
            target = target.min((duration - END_GUARD_SECS).max(0.0));
        }
        if self.state == TransportState::Playing {
            if let Some(session) = self.session.take() {
                self.fade_out(&mut *ctx.backend, session.voice, SEEK_FADE_SECS);
            }
            self.position = target;
            self.state = TransportState::Paused;
            if !self.try_start(ctx) {
                self.set_playing(ctx, false);
            }
        } else {
            self.position = target;
        }
        self.persist(ctx);
    }

    /// Set shuffle mode.
    pub(crate) fn set_shuffle<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, on: bool) {
        self.playlist.shuffle = on;
        ctx.persistence
            .write_modes(self.playlist.shuffle, self.playlist.repeat);
    }

    /// Set repeat mode.
    pub(crate) fn set_repeat<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, on: bool) {
        self.playlist.repeat = on;
        ctx.persistence
            .write_modes(self.playlist.shuffle, self.playlist.repeat);
    }

    /// Poll: crossfade hand-over, end of track, deferred starts and periodic
    /// persistence.
    pub(crate) fn update<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let now = ctx.backend.now();
        match self.state {
            TransportState::Crossfading { switch_at } if now >= switch_at => {
                self.state = TransportState::Paused;
                if ctx.unlocked && !self.try_start(ctx) {
                    self.set_playing(ctx, false);
                }
            }
            TransportState::Playing => {
                let ended = self.session.is_some_and(|s| now >= s.ends_at());
                if ended {
                    self.session = None;
                    self.track_ended(ctx);
                } else if now - self.last_persist >= self.timings.persist_every {
                    self.persist(ctx);
                }
            }
            TransportState::Paused => self.flush_intent(ctx),
            _ => {}
        }
    }

    fn track_ended<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        debug!(index = self.playlist.current_index(), "track ended");
        match self.playlist.next_index(&mut self.rng) {
            Advance::To(index) => {
                self.select(ctx, index as i64);
                self.state = TransportState::Paused;
                if !self.try_start(ctx) {
                    self.set_playing(ctx, false);
                }
            }
            Advance::End => self.end_of_playlist(ctx),
        }
    }

    fn end_of_playlist<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        info!("end of playlist");
        self.silence(ctx);
        self.wants_play = false;
        self.state = TransportState::Paused;
        self.select(ctx, 0);
        self.set_playing(ctx, false);
        self.persist(ctx);
    }

    fn change_track<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, index: usize) {
        let now = ctx.backend.now();
        match self.state {
            TransportState::Idle => return,
            TransportState::Playing => {
                if let Some(session) = self.session.take() {
                    self.fade_out(&mut *ctx.backend, session.voice, self.timings.crossfade);
                }
                self.select(ctx, index as i64);
                if self.timings.crossfade > 0.0 {
                    self.state = TransportState::Crossfading {
                        switch_at: now + self.timings.crossfade,
                    };
                } else {
                    self.state = TransportState::Paused;
                    if !self.try_start(ctx) {
                        self.set_playing(ctx, false);
                    }
                }
            }
            // The outgoing voice is already fading; only the destination moves.
            TransportState::Crossfading { .. } | TransportState::Paused => {
                self.select(ctx, index as i64);
            }
        }
        self.persist(ctx);
    }

    fn select<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, index: i64) {
        let before = self.playlist.current_index();
        let index = self.playlist.select(index);
        self.position = 0.0;
        if let Some(track) = self.current_track() {
            ctx.backend.preload(&track.source);
        }
        debug!(from = before, to = index, "track selected");
        if let Some(info) = self.track_info(&*ctx.backend) {
            ctx.events.push(EngineEvent::TrackChanged(info));
        }
    }

    /// Start the selected track at the stored position. While an outgoing
    /// voice is still fading the start waits for it in `Crossfading`.
    /// Returns `true` if the track is sounding or scheduled to.
    fn try_start<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) -> bool {
        let Some(track) = self.current_track() else {
            return false;
        };
        let mut asset = ctx.backend.asset(&track.source);
        if asset == AssetState::Unloaded {
            ctx.backend.preload(&track.source);
            asset = ctx.backend.asset(&track.source);
        }
        let duration = match asset {
            AssetState::Ready { duration } => duration,
            AssetState::Loading | AssetState::Unloaded => {
                debug!(source = %track.source, "track still decoding, start deferred");
                self.wants_play = true;
                return false;
            }
            AssetState::Failed(reason) => {
                warn!(source = %track.source, reason = %reason, "track unavailable");
                self.wants_play = false;
                return false;
            }
        };
        let now = ctx.backend.now();
        if now < self.fading_until {
            debug!(switch_at = self.fading_until, "previous track still fading, start queued");
            self.state = TransportState::Crossfading {
                switch_at: self.fading_until,
            };
            self.wants_play = true;
            self.set_playing(ctx, true);
            return true;
        }
        let offset = self.position.min((duration - END_GUARD_SECS).max(0.0));
        let spec = VoiceSpec::new(Channel::Music, track.source.clone())
            .at_offset(offset)
            .with_gain(0.0);
        let voice = match ctx.backend.start_voice(spec) {
            Ok(voice) => voice,
            Err(e) => {
                warn!(source = %track.source, error = %e, "failed to start track");
                self.wants_play = false;
                return false;
            }
        };
        ctx.backend.ramp_voice(voice, 1.0, now, self.timings.fade_in);
        self.session = Some(Session {
            voice,
            offset,
            started_at: now,
            duration,
        });
        self.position = offset;
        self.state = TransportState::Playing;
        self.wants_play = true;
        self.last_persist = now;
        self.set_playing(ctx, true);
        info!(index = self.playlist.current_index(), title = %track.title, "music playing");
        true
    }

    /// Fade out and forget the sounding voice, keeping its position.
    fn silence<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let now = ctx.backend.now();
        if let Some(session) = self.session.take() {
            self.position = session.position(now);
            self.fade_out(&mut *ctx.backend, session.voice, self.timings.fade_out);
        }
    }

    fn fade_out<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, voice: VoiceId, duration: f64) {
        let silent_at = fade_out_voice(backend, voice, duration);
        self.fading_until = self.fading_until.max(silent_at);
    }

    fn set_playing<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, playing: bool) {
        if self.reported_playing != playing {
            self.reported_playing = playing;
            ctx.events.push(EngineEvent::PlayStateChanged(playing));
        }
    }

    fn persist<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let now = ctx.backend.now();
        ctx.persistence
            .write_music(self.playlist.current_index(), self.position(now));
        self.last_persist = now;
    }
}

/// Ramp a voice to silence and stop it once silent. Returns the stop time.
pub(crate) fn fade_out_voice<B: AudioBackend + ?Sized>(
    backend: &mut B,
    voice: VoiceId,
    duration: f64,
) -> f64 {
    let now = backend.now();
    let stop_at = now + duration.max(0.0);
    backend.ramp_voice(voice, 0.0, now, duration);
    backend.stop_voice(voice, stop_at);
    stop_at
}
