//! Page wiring: gesture listeners, section observer and the update tick

use std::cell::{Cell, OnceCell};
use std::rc::{Rc, Weak};

use js_sys::{Array, Function};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Event, EventTarget, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    Window,
};
use wonderworks_audio::Gesture;

use crate::Shared;

/// Poll interval for [`wonderworks_audio::AudioEngine::update`].
const TICK_MS: i32 = 100;

struct GestureHook {
    target: EventTarget,
    callback: Function,
    attached: Cell<bool>,
}

impl GestureHook {
    fn attach(&self) -> Result<(), JsValue> {
        for gesture in Gesture::ALL {
            self.target
                .add_event_listener_with_callback(gesture.event_name(), &self.callback)?;
        }
        self.attached.set(true);
        Ok(())
    }

    fn detach(&self) {
        if !self.attached.replace(false) {
            return;
        }
        for gesture in Gesture::ALL {
            let _ = self
                .target
                .remove_event_listener_with_callback(gesture.event_name(), &self.callback);
        }
        debug!("gesture listeners removed");
    }
}

/// Browser hooks that drive an engine. Dropping them detaches everything.
pub(crate) struct PageBindings {
    window: Window,
    hook: Rc<OnceCell<GestureHook>>,
    _on_gesture: Closure<dyn FnMut(Event)>,
    observer: Option<IntersectionObserver>,
    _on_intersect: Option<Closure<dyn FnMut(Array, IntersectionObserver)>>,
    interval: i32,
    _on_tick: Closure<dyn FnMut()>,
}

impl PageBindings {
    pub(crate) fn attach(shared: &Rc<Shared>) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let hook = Rc::new(OnceCell::new());
        let on_gesture = gesture_callback(Rc::downgrade(shared), Rc::clone(&hook));
        let gesture_hook = GestureHook {
            target: document.clone().into(),
            callback: on_gesture.as_ref().unchecked_ref::<Function>().clone(),
            attached: Cell::new(false),
        };
        gesture_hook.attach()?;
        let _ = hook.set(gesture_hook);

        let (observer, on_intersect) = match observe_sections(shared, &document) {
            Ok(Some((observer, callback))) => (Some(observer), Some(callback)),
            Ok(None) => (None, None),
            Err(e) => {
                warn!(error = %crate::js_message(&e), "section observer unavailable");
                (None, None)
            }
        };

        let on_tick = tick_callback(Rc::downgrade(shared), Rc::clone(&hook));
        let interval = window.set_interval_with_callback_and_timeout_and_arguments_0(
            on_tick.as_ref().unchecked_ref(),
            TICK_MS,
        )?;

        Ok(Self {
            window,
            hook,
            _on_gesture: on_gesture,
            observer,
            _on_intersect: on_intersect,
            interval,
            _on_tick: on_tick,
        })
    }
}

impl Drop for PageBindings {
    fn drop(&mut self) {
        self.window.clear_interval_with_handle(self.interval);
        if let Some(observer) = &self.observer {
            observer.disconnect();
        }
        if let Some(hook) = self.hook.get() {
            hook.detach();
        }
    }
}

fn gesture_callback(shared: Weak<Shared>, hook: Rc<OnceCell<GestureHook>>) -> Closure<dyn FnMut(Event)> {
    Closure::wrap(Box::new(move |event: Event| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let Ok(gesture) = event.type_().parse::<Gesture>() else {
            return;
        };
        let unlocked = shared.with_engine(|engine| {
            engine.unlock(gesture);
            engine.is_unlocked()
        });
        if unlocked {
            if let Some(hook) = hook.get() {
                hook.detach();
            }
        }
    }) as Box<dyn FnMut(Event)>)
}

fn tick_callback(shared: Weak<Shared>, hook: Rc<OnceCell<GestureHook>>) -> Closure<dyn FnMut()> {
    Closure::wrap(Box::new(move || {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let unlocked = shared.with_engine(|engine| {
            engine.update();
            engine.is_unlocked()
        });
        // A resume that completed asynchronously unlocks on a tick, not a gesture.
        if unlocked {
            if let Some(hook) = hook.get() {
                hook.detach();
            }
        }
    }) as Box<dyn FnMut()>)
}

type SectionObserver = (IntersectionObserver, Closure<dyn FnMut(Array, IntersectionObserver)>);

fn observe_sections(
    shared: &Rc<Shared>,
    document: &web_sys::Document,
) -> Result<Option<SectionObserver>, JsValue> {
    let (sections, threshold) = shared.with_engine(|engine| {
        let sections: Vec<String> = engine.ambient_sections().map(str::to_owned).collect();
        (sections, engine.visibility_threshold())
    });
    if sections.is_empty() {
        return Ok(None);
    }

    let weak = Rc::downgrade(shared);
    let callback = Closure::wrap(Box::new(move |entries: Array, _observer: IntersectionObserver| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        for entry in entries.iter() {
            let entry: IntersectionObserverEntry = entry.unchecked_into();
            let id = entry.target().id();
            let ratio = if entry.is_intersecting() {
                entry.intersection_ratio()
            } else {
                0.0
            };
            shared.with_engine(|engine| engine.report_intersection(&id, ratio));
        }
    }) as Box<dyn FnMut(Array, IntersectionObserver)>);

    let init = IntersectionObserverInit::new();
    init.set_threshold(&JsValue::from_f64(threshold));
    let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;

    for id in &sections {
        match document.get_element_by_id(id) {
            Some(element) => observer.observe(&element),
            None => debug!(section = %id, "ambient section not on this page"),
        }
    }
    Ok(Some((observer, callback)))
}
