//! End-to-end engine behaviour driven through the headless backend.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use wonderworks_audio::{
    AmbientConfig, AudioEngine, Channel, EngineConfig, EngineEvent, Gesture, HeadlessBackend,
    JsonFileStore, MemoryStore, ResumeMode, SettingsStore, SfxDefinition, Track, VolumeCurve,
};

const TRACK_A: &str = "/assets/bgm-1.mp3";
const TRACK_B: &str = "/assets/bgm-2.mp3";
const TRACK_C: &str = "/assets/bgm-3.mp3";
const AMBIENCE: &str = "/assets/ambience-witches-cauldron.mp3";
const CLICK: &str = "/assets/sfx-old-computer-click.mp3";

fn backend() -> HeadlessBackend {
    HeadlessBackend::new()
        .with_asset(TRACK_A, 180.0)
        .with_asset(TRACK_B, 200.0)
        .with_asset(TRACK_C, 150.0)
        .with_asset(AMBIENCE, 60.0)
        .with_asset(CLICK, 0.3)
}

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_playlist(vec![
            Track::new(TRACK_A, "A"),
            Track::new(TRACK_B, "B"),
            Track::new(TRACK_C, "C"),
        ])
        .with_ambient(AmbientConfig {
            source: Some(AMBIENCE.to_string()),
            ..AmbientConfig::default()
        })
        .with_sfx(vec![SfxDefinition::new("click", CLICK)])
        .with_shuffle_seed(7)
}

fn engine_with(
    backend: HeadlessBackend,
    store: impl SettingsStore + 'static,
    config: EngineConfig,
) -> AudioEngine<HeadlessBackend> {
    AudioEngine::new(backend, Box::new(store), config).unwrap()
}

fn engine() -> AudioEngine<HeadlessBackend> {
    engine_with(backend(), MemoryStore::new(), config())
}

fn unlocked_engine() -> AudioEngine<HeadlessBackend> {
    let mut engine = engine();
    assert!(engine.unlock(Gesture::Click));
    engine
}

fn tick(engine: &mut AudioEngine<HeadlessBackend>, seconds: f64) {
    engine.backend_mut().advance(seconds);
    engine.update();
}

fn record_events(engine: &mut AudioEngine<HeadlessBackend>) -> Rc<RefCell<Vec<EngineEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

// ---- mixer ----

#[test]
fn test_mute_twice_settles_silent_and_unmute_restores_volume() {
    let mut engine = unlocked_engine();
    engine.set_volume(Channel::Music, 0.6);

    engine.set_muted(Channel::Music, true);
    engine.set_muted(Channel::Music, true);
    tick(&mut engine, 1.0);
    assert_eq!(engine.backend().channel_gain(Channel::Music), 0.0);
    assert!(engine.is_muted(Channel::Music));

    engine.set_muted(Channel::Music, false);
    tick(&mut engine, 1.0);
    assert_relative_eq!(engine.backend().channel_gain(Channel::Music), 0.6);
    assert_relative_eq!(engine.volume(Channel::Music), 0.6);
}

#[test]
fn test_channels_mute_independently() {
    let mut engine = unlocked_engine();
    engine.set_muted(Channel::Music, true);
    tick(&mut engine, 1.0);
    assert_eq!(engine.backend().channel_gain(Channel::Music), 0.0);
    assert_relative_eq!(engine.backend().channel_gain(Channel::Sfx), 0.22);
    assert!(engine.play_one_shot("click").is_some());
}

#[test]
fn test_volume_is_clamped() {
    let mut engine = engine();
    for channel in Channel::ALL {
        engine.set_volume(channel, -0.5);
        assert_eq!(engine.volume(channel), 0.0);
        engine.set_volume(channel, 1.7);
        assert_eq!(engine.volume(channel), 1.0);
    }
}

#[test]
fn test_fade_is_monotonic_and_reaches_target() {
    let mut engine = unlocked_engine();
    engine.set_volume(Channel::Music, 0.0);
    engine.fade_to(Channel::Music, 0.8, 500);

    let mut last = 0.0f32;
    for step in 0..=70 {
        let t = step as f64 * 0.01;
        let gain = engine.backend().gain_at(Channel::Music, t);
        assert!(gain >= last, "gain fell at t={t}");
        assert!((0.0..=1.0).contains(&gain));
        last = gain;
    }
    assert_relative_eq!(engine.backend().gain_at(Channel::Music, 0.5), 0.8, epsilon = 1e-6);
    assert_relative_eq!(engine.volume(Channel::Music), 0.8);
}

#[test]
fn test_quadratic_curve_round_trips_through_storage() {
    let store = MemoryStore::new();
    let config = config().with_volume_curve(VolumeCurve::Quadratic);
    let mut engine = engine_with(backend(), store.clone(), config.clone());
    engine.set_volume(Channel::Music, 0.5);
    assert_relative_eq!(engine.backend().channel_gain(Channel::Music), 0.25);
    drop(engine);

    let mut reloaded = engine_with(backend(), store, config);
    reloaded.init();
    assert_relative_eq!(reloaded.volume(Channel::Music), 0.5);
    assert_relative_eq!(reloaded.backend().channel_gain(Channel::Music), 0.25);
}

// ---- settings ----

#[test]
fn test_settings_survive_reload() {
    let store = MemoryStore::new();
    let mut engine = engine_with(backend(), store.clone(), config());
    engine.set_volume(Channel::Music, 0.42);
    engine.set_muted(Channel::Ambient, true);
    engine.load(2);
    engine.set_shuffle(true);
    engine.set_ambient_enabled(false);
    drop(engine);

    let reloaded = engine_with(backend(), store, config());
    assert_relative_eq!(reloaded.volume(Channel::Music), 0.42);
    let state = reloaded.state();
    assert!(state.muted.ambient);
    assert_eq!(state.current_track_index, 2);
    assert!(state.shuffle);
    assert!(!state.ambient_enabled);
}

#[test]
fn test_settings_survive_reload_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audio.json");

    let mut engine = engine_with(backend(), JsonFileStore::open(&path).unwrap(), config());
    engine.set_volume(Channel::Sfx, 0.8);
    engine.set_repeat(true);
    drop(engine);

    let reloaded = engine_with(backend(), JsonFileStore::open(&path).unwrap(), config());
    assert_relative_eq!(reloaded.volume(Channel::Sfx), 0.8);
    assert!(reloaded.state().repeat);
}

#[test]
fn test_storage_failure_keeps_session_state() {
    let store = MemoryStore::new();
    store.set_fail_writes(true);
    let mut engine = engine_with(backend(), store.clone(), config());
    engine.unlock(Gesture::Click);

    engine.set_volume(Channel::Music, 0.7);
    engine.play();
    engine.next();

    assert_relative_eq!(engine.volume(Channel::Music), 0.7);
    assert!(engine.state().playing);
    assert_eq!(engine.state().current_track_index, 1);
    assert!(store.is_empty());
}

#[test]
fn test_position_is_persisted_periodically() {
    let store = MemoryStore::new();
    let mut engine = engine_with(backend(), store.clone(), config());
    engine.unlock(Gesture::Click);
    engine.play();
    tick(&mut engine, 6.0);

    let stored: f64 = store
        .get("ona.audio.v1.music.position")
        .unwrap()
        .parse()
        .unwrap();
    assert_relative_eq!(stored, 6.0, epsilon = 1e-3);
}

// ---- playlist transport ----

#[test]
fn test_fresh_session_walks_playlist_then_stops() {
    let mut engine = engine();
    engine.init();
    assert_eq!(engine.state().current_track_index, 0);
    assert_eq!(engine.state().total_tracks, 3);

    engine.next();
    assert_eq!(engine.state().current_track_index, 1);
    engine.next();
    assert_eq!(engine.state().current_track_index, 2);
    engine.next();
    let state = engine.state();
    assert_eq!(state.current_track_index, 0);
    assert!(!state.playing);
}

#[test]
fn test_next_at_end_without_repeat_stops_playback() {
    let mut engine = unlocked_engine();
    engine.load(2);
    engine.play();
    assert!(engine.state().playing);

    engine.next();
    let state = engine.state();
    assert_eq!(state.current_track_index, 0);
    assert!(!state.playing);
    assert_eq!(state.track.unwrap().position_secs, 0.0);

    tick(&mut engine, 1.0);
    assert!(engine.backend().sounding(Channel::Music).is_empty());
}

#[test]
fn test_next_at_end_with_repeat_keeps_playing() {
    let mut engine = unlocked_engine();
    engine.set_repeat(true);
    engine.load(2);
    engine.play();

    engine.next();
    assert_eq!(engine.state().current_track_index, 0);
    assert!(engine.state().playing);

    tick(&mut engine, 1.0);
    let sounding = engine.backend().sounding(Channel::Music);
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].source, TRACK_A);
}

#[test]
fn test_prev_past_threshold_restarts_track() {
    let mut engine = unlocked_engine();
    engine.load(1);
    engine.play();
    tick(&mut engine, 5.0);

    engine.prev();
    let track = engine.current_track().unwrap();
    assert_eq!(track.index, 1);
    assert!(track.position_secs < 0.01);
    assert!(engine.state().playing);
}

#[test]
fn test_prev_within_threshold_steps_back() {
    let mut engine = unlocked_engine();
    engine.load(1);
    engine.play();
    tick(&mut engine, 2.0);

    engine.prev();
    let track = engine.current_track().unwrap();
    assert_eq!(track.index, 0);
    assert_eq!(track.position_secs, 0.0);

    // At the first track without repeat, prev stays put
    engine.prev();
    assert_eq!(engine.state().current_track_index, 0);
    engine.set_repeat(true);
    engine.prev();
    assert_eq!(engine.state().current_track_index, 2);
}

#[test]
fn test_pause_preserves_position() {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 12.0);
    engine.pause();
    assert!(!engine.state().playing);
    tick(&mut engine, 30.0);
    assert_relative_eq!(engine.current_track().unwrap().position_secs, 12.0);

    engine.play();
    let voice = engine.backend().voices().last().unwrap();
    assert_relative_eq!(voice.offset, 12.0);
}

#[test]
fn test_stop_rewinds() {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 12.0);
    engine.stop();
    assert!(!engine.state().playing);
    assert_eq!(engine.current_track().unwrap().position_secs, 0.0);
}

#[test]
fn test_load_normalizes_index() {
    let mut engine = engine();
    engine.load(7);
    assert_eq!(engine.state().current_track_index, 1);
    engine.load(-1);
    assert_eq!(engine.state().current_track_index, 2);
}

#[test]
fn test_seek_clamps_into_track() {
    let mut engine = unlocked_engine();
    engine.play();
    engine.seek(1000.0);
    assert_relative_eq!(engine.current_track().unwrap().position_secs, 179.9);
    tick(&mut engine, 0.1);
    let voice = engine.backend().voices().last().unwrap();
    assert_relative_eq!(voice.offset, 179.9);

    engine.seek(-4.0);
    tick(&mut engine, 0.1);
    assert_eq!(engine.backend().voices().last().unwrap().offset, 0.0);
    assert_music_never_overlaps(&engine);
}

#[test]
fn test_track_end_advances() {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 181.0);
    let state = engine.state();
    assert_eq!(state.current_track_index, 1);
    assert!(state.playing);
}

#[test]
fn test_last_track_end_without_repeat_stops() {
    let mut engine = unlocked_engine();
    engine.load(2);
    engine.play();
    let events = record_events(&mut engine);
    tick(&mut engine, 151.0);

    let state = engine.state();
    assert_eq!(state.current_track_index, 0);
    assert!(!state.playing);
    assert!(events
        .borrow()
        .contains(&EngineEvent::PlayStateChanged(false)));
}

#[test]
fn test_shuffle_picks_valid_tracks() {
    let mut engine = unlocked_engine();
    assert!(engine.toggle_shuffle());
    engine.play();
    for _ in 0..20 {
        engine.next();
        tick(&mut engine, 1.0);
        assert!(engine.state().current_track_index < 3);
        assert!(engine.state().playing);
    }
}

// ---- crossfades ----

/// Every music voice is silent before the next one starts.
fn assert_music_never_overlaps(engine: &AudioEngine<HeadlessBackend>) {
    let mut voices: Vec<_> = engine
        .backend()
        .voices()
        .iter()
        .filter(|v| v.channel == Channel::Music)
        .collect();
    voices.sort_by(|a, b| a.started_at.total_cmp(&b.started_at));
    for pair in voices.windows(2) {
        let (old, new) = (pair[0], pair[1]);
        let silent_at = old
            .stop_at
            .into_iter()
            .chain(old.ends_at)
            .fold(f64::INFINITY, f64::min);
        assert!(
            silent_at <= new.started_at,
            "{} still sounding at {} when {} starts",
            old.source,
            new.started_at,
            new.source
        );
    }
}

/// Play A for 10 s, skip to B and interrupt the crossfade 100 ms in.
fn engine_mid_crossfade() -> AudioEngine<HeadlessBackend> {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 10.0);
    engine.next();
    tick(&mut engine, 0.1);
    engine
}

#[test]
fn test_pause_then_play_during_crossfade_waits_for_fade() {
    let mut engine = engine_mid_crossfade();
    engine.pause();
    engine.play();
    assert!(engine.state().playing);

    tick(&mut engine, 0.1);
    assert_eq!(engine.backend().sounding(Channel::Music).len(), 1);
    assert_eq!(engine.backend().sounding(Channel::Music)[0].source, TRACK_A);

    tick(&mut engine, 1.0);
    let sounding = engine.backend().sounding(Channel::Music);
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].source, TRACK_B);
    assert_music_never_overlaps(&engine);
}

#[test]
fn test_load_then_play_during_crossfade_waits_for_fade() {
    let mut engine = engine_mid_crossfade();
    engine.load(2);
    engine.play();

    tick(&mut engine, 0.1);
    assert_eq!(engine.backend().sounding(Channel::Music).len(), 1);
    tick(&mut engine, 1.0);
    let sounding = engine.backend().sounding(Channel::Music);
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].source, TRACK_C);
    assert_music_never_overlaps(&engine);
}

#[test]
fn test_stop_then_play_during_crossfade_waits_for_fade() {
    let mut engine = engine_mid_crossfade();
    engine.stop();
    engine.play();

    tick(&mut engine, 1.0);
    let sounding = engine.backend().sounding(Channel::Music);
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].source, TRACK_B);
    assert_eq!(sounding[0].offset, 0.0);
    assert_music_never_overlaps(&engine);
}

#[test]
fn test_play_right_after_playlist_end_waits_for_fade() {
    let mut engine = unlocked_engine();
    engine.load(2);
    engine.play();
    tick(&mut engine, 10.0);
    engine.next();
    assert!(!engine.state().playing);

    engine.play();
    tick(&mut engine, 0.1);
    assert_eq!(engine.backend().sounding(Channel::Music)[0].source, TRACK_C);
    tick(&mut engine, 1.0);
    let sounding = engine.backend().sounding(Channel::Music);
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].source, TRACK_A);
    assert_music_never_overlaps(&engine);
}

#[test]
fn test_crossfade_never_overlaps_tracks() {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 10.0);

    engine.next();
    assert!(engine.state().playing);
    tick(&mut engine, 0.3);
    assert_eq!(engine.backend().voices().len(), 1, "incoming track waits");

    tick(&mut engine, 0.5);
    let voices = engine.backend().voices();
    assert_eq!(voices.len(), 2);
    let (old, new) = (&voices[0], &voices[1]);
    assert_eq!(new.source, TRACK_B);
    assert!(new.started_at >= old.stop_at.unwrap());
}

#[test]
fn test_next_during_crossfade_retargets() {
    let mut engine = unlocked_engine();
    engine.play();
    tick(&mut engine, 10.0);

    engine.next();
    engine.backend_mut().advance(0.1);
    engine.next();
    tick(&mut engine, 1.0);

    let voices = engine.backend().voices();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[1].source, TRACK_C);
    assert_eq!(engine.state().current_track_index, 2);
}

#[test]
fn test_zero_crossfade_cuts() {
    let config = config().with_crossfade_ms(0);
    let mut engine = engine_with(backend(), MemoryStore::new(), config);
    engine.unlock(Gesture::Click);
    engine.play();
    tick(&mut engine, 10.0);
    engine.next();

    let voices = engine.backend().voices();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].stop_at, Some(10.0));
    assert_eq!(voices[1].started_at, 10.0);
}

// ---- unlock gate ----

#[test]
fn test_play_before_unlock_is_replayed() {
    let mut engine = engine();
    let events = record_events(&mut engine);
    engine.play();
    assert!(!engine.state().playing);
    assert!(engine.state().awaiting_gesture);
    assert!(engine.backend().voices().is_empty());

    assert!(engine.unlock(Gesture::TouchStart));
    assert!(engine.state().playing);
    assert_eq!(
        *events.borrow(),
        [EngineEvent::Unlocked, EngineEvent::PlayStateChanged(true)]
    );
    assert!(!engine.unlock(Gesture::Click));
}

#[test]
fn test_deferred_resume_replays_on_update() {
    let backend = backend().with_resume_mode(ResumeMode::Deferred);
    let mut engine = engine_with(backend, MemoryStore::new(), config());
    engine.play();
    assert!(!engine.unlock(Gesture::KeyDown));
    engine.update();
    assert!(!engine.state().playing);

    engine.backend_mut().finish_resume();
    engine.update();
    assert!(engine.is_unlocked());
    assert!(engine.state().playing);
}

#[test]
fn test_failed_resume_retries_on_next_gesture() {
    let backend = backend().with_resume_mode(ResumeMode::Fail);
    let mut engine = engine_with(backend, MemoryStore::new(), config());
    engine.play();
    assert!(!engine.unlock(Gesture::Click));
    assert!(!engine.state().playing);

    engine.backend_mut().set_resume_mode(ResumeMode::Immediate);
    assert!(engine.unlock(Gesture::Click));
    assert!(engine.state().playing);
}

#[test]
fn test_muted_play_waits_for_unmute() {
    let mut engine = unlocked_engine();
    engine.set_muted(Channel::Music, true);
    engine.play();
    assert!(!engine.state().playing);

    engine.set_muted(Channel::Music, false);
    assert!(engine.state().playing);
}

// ---- assets ----

#[test]
fn test_failed_track_does_not_break_engine() {
    let mut backend = backend();
    backend.fail_asset(TRACK_A, "corrupt file");
    let mut engine = engine_with(backend, MemoryStore::new(), config());
    engine.unlock(Gesture::Click);

    engine.play();
    assert!(!engine.state().playing);
    engine.next();
    engine.play();
    assert!(engine.state().playing);

    engine.report_visibility("wonderworks-intro", true);
    assert!(engine.is_ambient_playing());
    assert!(engine.play_one_shot("click").is_some());
}

#[test]
fn test_play_waits_for_decoding() {
    let mut backend = backend();
    backend.hold_asset(TRACK_A, 180.0);
    let mut engine = engine_with(backend, MemoryStore::new(), config());
    engine.unlock(Gesture::Click);

    engine.play();
    assert!(!engine.state().playing);
    tick(&mut engine, 0.1);
    assert!(!engine.state().playing);

    engine.backend_mut().release_asset(TRACK_A);
    tick(&mut engine, 0.1);
    assert!(engine.state().playing);
}

// ---- ambient ----

#[test]
fn test_visibility_pauses_and_resumes_ambient() {
    let mut engine = unlocked_engine();
    engine.report_visibility("wonderworks-intro", true);
    assert!(engine.is_ambient_playing());

    tick(&mut engine, 20.0);
    // Moving between watched sections keeps the loop going
    engine.report_visibility("wonderworks-wrapper", true);
    engine.report_visibility("wonderworks-intro", false);
    assert!(engine.is_ambient_playing());
    assert_eq!(engine.backend().voices().len(), 1);

    engine.report_visibility("wonderworks-wrapper", false);
    assert!(!engine.is_ambient_playing());

    tick(&mut engine, 5.0);
    engine.report_intersection("wonderworks-intro", 0.5);
    assert!(engine.is_ambient_playing());
    let voice = engine.backend().voices().last().unwrap();
    assert!(voice.looping);
    assert_relative_eq!(voice.offset, 20.0);
}

#[test]
fn test_ambient_restarts_after_long_absence() {
    let mut engine = unlocked_engine();
    engine.report_visibility("wonderworks-intro", true);
    tick(&mut engine, 20.0);
    engine.report_visibility("wonderworks-intro", false);

    tick(&mut engine, 31.0 * 60.0);
    engine.report_visibility("wonderworks-intro", true);
    assert_eq!(engine.backend().voices().last().unwrap().offset, 0.0);
}

#[test]
fn test_ambient_visible_before_unlock_starts_on_unlock() {
    let mut engine = engine();
    engine.report_visibility("wonderworks-wrapper", true);
    assert!(!engine.is_ambient_playing());
    engine.unlock(Gesture::PointerDown);
    assert!(engine.is_ambient_playing());
}

#[test]
fn test_ambient_master_switch() {
    let mut engine = unlocked_engine();
    engine.report_visibility("wonderworks-intro", true);
    assert!(!engine.toggle_ambient());
    assert!(!engine.is_ambient_playing());

    engine.report_visibility("wonderworks-intro", false);
    engine.report_visibility("wonderworks-intro", true);
    assert!(!engine.is_ambient_playing());

    assert!(engine.toggle_ambient());
    assert!(engine.is_ambient_playing());
}

#[test]
fn test_missing_ambient_does_not_ask_for_gesture() {
    let config = config().without_ambient();
    let mut engine = engine_with(backend(), MemoryStore::new(), config);
    engine.play_ambient();
    assert!(!engine.state().awaiting_gesture);

    engine.play();
    assert!(engine.state().awaiting_gesture);
}

#[test]
fn test_unwatched_section_is_ignored() {
    let mut engine = unlocked_engine();
    engine.report_visibility("faq-terminal", true);
    assert!(!engine.is_ambient_playing());
}

// ---- sound effects ----

#[test]
fn test_one_shots_are_fire_and_forget() {
    let mut engine = engine();
    assert!(engine.play_one_shot("click").is_none(), "locked");

    engine.unlock(Gesture::Click);
    assert!(engine.play_one_shot("click").is_some());
    assert!(engine.play_one_shot("no-such-effect").is_none());

    engine.set_muted(Channel::Sfx, true);
    assert!(engine.play_one_shot("click").is_none(), "muted");
}

#[test]
fn test_held_one_shot_release() {
    let mut engine = unlocked_engine();
    let voice = engine.hold_one_shot("click").unwrap();
    engine.backend_mut().advance(0.05);
    assert!(engine.release_held(voice));
    assert!(!engine.release_held(voice));
}

// ---- observers ----

#[test]
fn test_listeners_see_changes_until_unsubscribed() {
    let mut engine = engine();
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kinds);
    let id = engine.subscribe(move |e| sink.borrow_mut().push(e.kind()));

    engine.set_volume(Channel::Music, 0.5);
    engine.set_volume(Channel::Music, 0.5);
    engine.next();
    engine.set_muted(Channel::Sfx, true);
    assert_eq!(*kinds.borrow(), ["volumeChange", "trackChange", "muteChange"]);

    assert!(engine.unsubscribe(id));
    engine.next();
    assert_eq!(kinds.borrow().len(), 3);
}

#[test]
fn test_track_change_event_carries_track() {
    let mut engine = unlocked_engine();
    let events = record_events(&mut engine);
    engine.load(1);
    let events = events.borrow();
    let Some(EngineEvent::TrackChanged(info)) = events.first() else {
        panic!("expected a track change, got {events:?}");
    };
    assert_eq!(info.title, "B");
    assert_eq!(info.total, 3);
    assert_eq!(info.duration_secs, Some(200.0));
}
