//! Web Audio implementation of [`AudioBackend`]
//!
//! Graph: one `GainNode` per channel feeding a master `GainNode` feeding the
//! destination. Every voice is an `AudioBufferSourceNode` with its own
//! `GainNode` in front of its channel stage. Assets are fetched and decoded in
//! the background; the engine sees them as `Loading` until the decode lands.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::ArrayBuffer;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    AudioBuffer, AudioBufferSourceNode, AudioContext, AudioContextState, AudioParam, GainNode,
    Response,
};
use wonderworks_audio::{
    AssetState, AudioBackend, AudioError, Channel, ChannelMap, OutputState, Result, VoiceId,
    VoiceSpec,
};

use crate::js_message;

enum Asset {
    Loading,
    Ready(AudioBuffer),
    Failed(String),
}

struct WebVoice {
    node: AudioBufferSourceNode,
    gain: GainNode,
    _on_ended: Closure<dyn FnMut()>,
}

/// [`AudioBackend`] over a browser `AudioContext`.
pub struct WebAudioBackend {
    context: AudioContext,
    master: GainNode,
    stages: ChannelMap<GainNode>,
    assets: Rc<RefCell<HashMap<String, Asset>>>,
    voices: HashMap<VoiceId, WebVoice>,
    ended: Rc<RefCell<Vec<VoiceId>>>,
    next_voice: u64,
}

fn js_error(e: JsValue) -> AudioError {
    AudioError::backend(js_message(&e))
}

fn schedule(result: std::result::Result<AudioParam, JsValue>) {
    if let Err(e) = result {
        debug!(error = %js_message(&e), "gain automation rejected");
    }
}

impl WebAudioBackend {
    /// Create the context and the channel stages. The context starts
    /// suspended until a gesture resumes it.
    pub fn new() -> Result<Self> {
        let context = AudioContext::new().map_err(js_error)?;
        let master = context.create_gain().map_err(js_error)?;
        master
            .connect_with_audio_node(&context.destination())
            .map_err(js_error)?;

        let stage = || -> Result<GainNode> {
            let node = context.create_gain().map_err(js_error)?;
            node.connect_with_audio_node(&master).map_err(js_error)?;
            Ok(node)
        };
        let stages = ChannelMap {
            music: stage()?,
            ambient: stage()?,
            sfx: stage()?,
        };

        Ok(Self {
            context,
            master,
            stages,
            assets: Rc::new(RefCell::new(HashMap::new())),
            voices: HashMap::new(),
            ended: Rc::new(RefCell::new(Vec::new())),
            next_voice: 1,
        })
    }

    /// Number of voices not yet reported as ended.
    pub fn live_voices(&self) -> usize {
        self.voices.len()
    }

    /// Forget voices whose source node has ended.
    fn reap(&mut self) {
        let ended: Vec<VoiceId> = self.ended.borrow_mut().drain(..).collect();
        for id in ended {
            if let Some(voice) = self.voices.remove(&id) {
                voice.node.set_onended(None);
                let _ = voice.gain.disconnect();
            }
        }
    }
}

async fn fetch_and_decode(context: AudioContext, source: String) -> std::result::Result<AudioBuffer, String> {
    let window = web_sys::window().ok_or("no window")?;
    let response: Response = JsFuture::from(window.fetch_with_str(&source))
        .await
        .map_err(|e| js_message(&e))?
        .dyn_into()
        .map_err(|e| js_message(&e))?;
    if !response.ok() {
        return Err(format!("HTTP {}", response.status()));
    }
    let body = response.array_buffer().map_err(|e| js_message(&e))?;
    let bytes: ArrayBuffer = JsFuture::from(body)
        .await
        .map_err(|e| js_message(&e))?
        .dyn_into()
        .map_err(|e| js_message(&e))?;
    let decoding = context
        .decode_audio_data(&bytes)
        .map_err(|e| js_message(&e))?;
    JsFuture::from(decoding)
        .await
        .map_err(|e| js_message(&e))?
        .dyn_into()
        .map_err(|e| js_message(&e))
}

impl AudioBackend for WebAudioBackend {
    fn now(&self) -> f64 {
        self.context.current_time()
    }

    fn output_state(&self) -> OutputState {
        match self.context.state() {
            AudioContextState::Running => OutputState::Running,
            AudioContextState::Closed => OutputState::Closed,
            _ => OutputState::Suspended,
        }
    }

    fn resume(&mut self) -> Result<()> {
        let pending = self.context.resume().map_err(js_error)?;
        spawn_local(async move {
            if let Err(e) = JsFuture::from(pending).await {
                warn!(error = %js_message(&e), "audio context refused to resume");
            }
        });
        Ok(())
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master.gain().set_value(gain);
    }

    fn set_gain(&mut self, channel: Channel, value: f32) {
        let now = self.now();
        let param = self.stages[channel].gain();
        schedule(param.cancel_scheduled_values(now));
        schedule(param.set_value_at_time(value, now));
    }

    fn ramp_gain(&mut self, channel: Channel, from: f32, to: f32, start_at: f64, duration: f64) {
        let param = self.stages[channel].gain();
        schedule(param.cancel_scheduled_values(start_at));
        if duration <= 0.0 {
            schedule(param.set_value_at_time(to, start_at));
            return;
        }
        schedule(param.set_value_at_time(from, start_at));
        schedule(param.linear_ramp_to_value_at_time(to, start_at + duration));
    }

    fn preload(&mut self, source: &str) {
        if self.assets.borrow().contains_key(source) {
            return;
        }
        self.assets
            .borrow_mut()
            .insert(source.to_string(), Asset::Loading);

        let assets = Rc::clone(&self.assets);
        let context = self.context.clone();
        let source = source.to_string();
        spawn_local(async move {
            let entry = match fetch_and_decode(context, source.clone()).await {
                Ok(buffer) => {
                    debug!(source = %source, duration = buffer.duration(), "asset decoded");
                    Asset::Ready(buffer)
                }
                Err(reason) => {
                    warn!(source = %source, reason = %reason, "asset failed to load");
                    Asset::Failed(reason)
                }
            };
            assets.borrow_mut().insert(source, entry);
        });
    }

    fn asset(&self, source: &str) -> AssetState {
        match self.assets.borrow().get(source) {
            None => AssetState::Unloaded,
            Some(Asset::Loading) => AssetState::Loading,
            Some(Asset::Ready(buffer)) => AssetState::Ready {
                duration: buffer.duration(),
            },
            Some(Asset::Failed(reason)) => AssetState::Failed(reason.clone()),
        }
    }

    fn start_voice(&mut self, spec: VoiceSpec) -> Result<VoiceId> {
        self.reap();
        let buffer = {
            let assets = self.assets.borrow();
            match assets.get(spec.source.as_str()) {
                Some(Asset::Ready(buffer)) => buffer.clone(),
                Some(Asset::Failed(reason)) => {
                    return Err(AudioError::asset_load(spec.source.clone(), reason.clone()))
                }
                _ => return Err(AudioError::asset_load(spec.source.clone(), "asset not decoded")),
            }
        };

        let now = self.now();
        let gain = self.context.create_gain().map_err(js_error)?;
        let param = gain.gain();
        schedule(param.set_value_at_time(spec.gain, now));
        if let Some((first, rest)) = spec.envelope.split_first() {
            schedule(param.set_value_at_time(first.value, first.time));
            for point in rest {
                schedule(param.linear_ramp_to_value_at_time(point.value, point.time));
            }
        }
        gain.connect_with_audio_node(&self.stages[spec.channel])
            .map_err(js_error)?;

        let node = self.context.create_buffer_source().map_err(js_error)?;
        node.set_buffer(Some(&buffer));
        node.set_loop(spec.looping);
        node.connect_with_audio_node(&gain).map_err(js_error)?;

        let id = VoiceId(self.next_voice);
        self.next_voice += 1;
        let ended = Rc::clone(&self.ended);
        let on_ended = Closure::wrap(Box::new(move || ended.borrow_mut().push(id)) as Box<dyn FnMut()>);
        node.set_onended(Some(on_ended.as_ref().unchecked_ref()));
        node.start_with_when_and_grain_offset(now, spec.offset)
            .map_err(js_error)?;

        self.voices.insert(
            id,
            WebVoice {
                node,
                gain,
                _on_ended: on_ended,
            },
        );
        Ok(id)
    }

    fn ramp_voice(&mut self, voice: VoiceId, to: f32, start_at: f64, duration: f64) {
        let Some(v) = self.voices.get(&voice) else {
            return;
        };
        let param = v.gain.gain();
        let current = param.value();
        schedule(param.cancel_scheduled_values(start_at));
        schedule(param.set_value_at_time(current, start_at));
        schedule(param.linear_ramp_to_value_at_time(to, start_at + duration.max(0.0)));
    }

    fn stop_voice(&mut self, voice: VoiceId, at: f64) {
        if let Some(v) = self.voices.get(&voice) {
            if let Err(e) = v.node.stop_with_when(at) {
                debug!(?voice, error = %js_message(&e), "stop rejected");
            }
        }
    }
}

impl Drop for WebAudioBackend {
    fn drop(&mut self) {
        for voice in self.voices.values() {
            voice.node.set_onended(None);
        }
        let _ = self.context.close();
    }
}
