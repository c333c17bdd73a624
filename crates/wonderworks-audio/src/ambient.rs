//! Section-scoped ambient loop
//!
//! One looping asset that sounds while a watched page section is visible.
//! Leaving the section pauses the loop and keeps its position; coming back
//! resumes from there unless the visitor was away long enough that a fresh
//! start sounds better.

use tracing::{debug, info, warn};

use crate::backend::{AssetState, AudioBackend, VoiceId, VoiceSpec};
use crate::channel::Channel;
use crate::config::{secs, EngineConfig};
use crate::engine::Ctx;
use crate::events::EngineEvent;
use crate::transport::fade_out_voice;

const END_GUARD_SECS: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct Loop {
    voice: VoiceId,
    offset: f64,
    started_at: f64,
    duration: f64,
}

impl Loop {
    fn position(&self, now: f64) -> f64 {
        let pos = self.offset + (now - self.started_at).max(0.0);
        if self.duration > 0.0 {
            pos % self.duration
        } else {
            0.0
        }
    }
}

/// The ambient channel's transport.
#[derive(Debug, Clone)]
pub struct AmbientChannel {
    source: Option<String>,
    enabled: bool,
    wants_play: bool,
    current: Option<Loop>,
    position: f64,
    stopped_at: Option<f64>,
    last_persist: f64,
    fade_in: f64,
    fade_out: f64,
    restart_after: f64,
    persist_every: f64,
}

impl AmbientChannel {
    /// Silent channel for the configured loop.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            source: config.ambient.source.clone(),
            enabled: true,
            wants_play: false,
            current: None,
            position: 0.0,
            stopped_at: None,
            last_persist: 0.0,
            fade_in: secs(config.fades.ambient_fade_in_ms),
            fade_out: secs(config.fades.ambient_fade_out_ms),
            restart_after: config.ambient.restart_after_secs,
            persist_every: config.ambient.persist_interval_secs,
        }
    }

    pub(crate) fn restore(&mut self, enabled: bool, position: f64) {
        self.enabled = enabled;
        self.position = position;
    }

    /// Asset source, if the channel is configured.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Master on/off switch.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while the loop is sounding.
    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    /// True if the loop should be sounding once allowed.
    pub fn wants_play(&self) -> bool {
        self.wants_play
    }

    /// Loop position at `now`.
    pub fn position(&self, now: f64) -> f64 {
        self.current.map_or(self.position, |l| l.position(now))
    }

    /// Request the loop (a watched section became visible).
    pub(crate) fn play<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if self.source.is_none() {
            return;
        }
        self.wants_play = true;
        self.flush_intent(ctx);
    }

    /// Pause the loop, keeping its position.
    pub(crate) fn pause<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        self.wants_play = false;
        self.silence(ctx);
    }

    /// Flip the master switch. Disabling silences the loop but remembers
    /// whether it was wanted.
    pub(crate) fn set_enabled<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        ctx.persistence.write_ambient_enabled(enabled);
        if enabled {
            self.flush_intent(ctx);
        } else {
            self.silence(ctx);
        }
    }

    /// Start the loop if it is wanted and allowed.
    pub(crate) fn flush_intent<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        if !self.wants_play || self.current.is_some() || !self.enabled {
            return;
        }
        if !ctx.unlocked || ctx.muted {
            debug!(unlocked = ctx.unlocked, muted = ctx.muted, "ambient start deferred");
            return;
        }
        self.try_start(ctx);
    }

    /// Poll: periodic persistence and deferred starts.
    pub(crate) fn update<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let now = ctx.backend.now();
        if let Some(current) = self.current {
            if now - self.last_persist >= self.persist_every {
                ctx.persistence
                    .write_ambient_position(current.position(now));
                self.last_persist = now;
            }
        } else {
            self.flush_intent(ctx);
        }
    }

    fn try_start<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let now = ctx.backend.now();
        if self
            .stopped_at
            .is_some_and(|stopped| now - stopped > self.restart_after)
        {
            debug!("ambient away long enough, restarting from the top");
            self.position = 0.0;
        }
        let mut asset = ctx.backend.asset(&source);
        if asset == AssetState::Unloaded {
            ctx.backend.preload(&source);
            asset = ctx.backend.asset(&source);
        }
        let duration = match asset {
            AssetState::Ready { duration } => duration,
            AssetState::Loading | AssetState::Unloaded => return,
            AssetState::Failed(reason) => {
                warn!(source = %source, reason = %reason, "ambient loop unavailable");
                self.wants_play = false;
                return;
            }
        };
        let offset = self.position.min((duration - END_GUARD_SECS).max(0.0));
        let spec = VoiceSpec::new(Channel::Ambient, source.clone())
            .at_offset(offset)
            .looping(true)
            .with_gain(0.0);
        match ctx.backend.start_voice(spec) {
            Ok(voice) => {
                ctx.backend.ramp_voice(voice, 1.0, now, self.fade_in);
                self.current = Some(Loop {
                    voice,
                    offset,
                    started_at: now,
                    duration,
                });
                self.last_persist = now;
                ctx.events.push(EngineEvent::AmbientStateChanged(true));
                info!(offset, "ambient started");
            }
            Err(e) => {
                warn!(source = %source, error = %e, "failed to start ambient loop");
                self.wants_play = false;
            }
        }
    }

    fn silence<B: AudioBackend + ?Sized>(&mut self, ctx: &mut Ctx<'_, B>) {
        let Some(current) = self.current.take() else {
            return;
        };
        let now = ctx.backend.now();
        self.position = current.position(now);
        self.stopped_at = Some(now);
        fade_out_voice(&mut *ctx.backend, current.voice, self.fade_out);
        ctx.persistence.write_ambient_position(self.position);
        ctx.events.push(EngineEvent::AmbientStateChanged(false));
        info!(position = self.position, "ambient paused");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmbientConfig;
    use crate::headless::HeadlessBackend;
    use crate::settings::{MemoryStore, Persistence, SettingKeys, SettingsStore};

    const LOOP: &str = "/amb.mp3";

    struct Rig {
        backend: HeadlessBackend,
        persistence: Persistence,
        events: Vec<EngineEvent>,
        store: MemoryStore,
        unlocked: bool,
    }

    impl Rig {
        fn new() -> Self {
            let store = MemoryStore::new();
            Self {
                backend: HeadlessBackend::new().with_asset(LOOP, 60.0),
                persistence: Persistence::new(Box::new(store.clone()), SettingKeys::new("test.")),
                events: Vec::new(),
                store,
                unlocked: true,
            }
        }

        fn ctx(&mut self) -> Ctx<'_, HeadlessBackend> {
            Ctx {
                backend: &mut self.backend,
                persistence: &mut self.persistence,
                events: &mut self.events,
                muted: false,
                unlocked: self.unlocked,
            }
        }
    }

    fn channel() -> AmbientChannel {
        let config = EngineConfig::default().with_ambient(AmbientConfig {
            source: Some(LOOP.to_string()),
            ..AmbientConfig::default()
        });
        AmbientChannel::new(&config)
    }

    #[test]
    fn test_resume_continues_from_pause_point() {
        let mut rig = Rig::new();
        let mut ambient = channel();
        ambient.play(&mut rig.ctx());
        assert!(ambient.is_playing());

        rig.backend.set_time(20.0);
        ambient.pause(&mut rig.ctx());
        assert!(!ambient.is_playing());
        assert_eq!(ambient.position(20.0), 20.0);

        rig.backend.set_time(25.0);
        ambient.play(&mut rig.ctx());
        let voice = &rig.backend.voices()[1];
        assert!(voice.looping);
        assert_eq!(voice.offset, 20.0);
        assert_eq!(
            rig.events,
            [
                EngineEvent::AmbientStateChanged(true),
                EngineEvent::AmbientStateChanged(false),
                EngineEvent::AmbientStateChanged(true),
            ]
        );
    }

    #[test]
    fn test_long_absence_restarts_from_top() {
        let mut rig = Rig::new();
        let mut ambient = channel();
        ambient.play(&mut rig.ctx());
        rig.backend.set_time(20.0);
        ambient.pause(&mut rig.ctx());

        rig.backend.set_time(20.0 + 31.0 * 60.0);
        ambient.play(&mut rig.ctx());
        assert_eq!(rig.backend.voices()[1].offset, 0.0);
    }

    #[test]
    fn test_disable_remembers_request() {
        let mut rig = Rig::new();
        let mut ambient = channel();
        ambient.play(&mut rig.ctx());

        ambient.set_enabled(&mut rig.ctx(), false);
        assert!(!ambient.is_playing());
        assert!(ambient.wants_play());
        assert_eq!(rig.store.get("test.ambient.enabled").as_deref(), Some("false"));

        ambient.set_enabled(&mut rig.ctx(), true);
        assert!(ambient.is_playing());
    }

    #[test]
    fn test_unconfigured_loop_records_no_intent() {
        let mut rig = Rig::new();
        rig.unlocked = false;
        let mut ambient = AmbientChannel::new(&EngineConfig::default().without_ambient());
        ambient.play(&mut rig.ctx());
        assert!(!ambient.wants_play());

        rig.unlocked = true;
        ambient.update(&mut rig.ctx());
        assert!(!ambient.is_playing());
        assert!(rig.events.is_empty());
    }

    #[test]
    fn test_locked_output_defers_until_update() {
        let mut rig = Rig::new();
        rig.unlocked = false;
        let mut ambient = channel();
        ambient.play(&mut rig.ctx());
        assert!(!ambient.is_playing());
        assert!(rig.backend.voices().is_empty());

        rig.unlocked = true;
        ambient.update(&mut rig.ctx());
        assert!(ambient.is_playing());
    }

    #[test]
    fn test_position_persisted_while_playing() {
        let mut rig = Rig::new();
        let mut ambient = channel();
        ambient.play(&mut rig.ctx());

        rig.backend.set_time(5.0);
        ambient.update(&mut rig.ctx());
        assert_eq!(rig.store.get("test.ambient.position"), None);

        rig.backend.set_time(10.0);
        ambient.update(&mut rig.ctx());
        assert_eq!(rig.store.get("test.ambient.position").as_deref(), Some("10.000"));
    }
}
