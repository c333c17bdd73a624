//! State-change notifications
//!
//! Operations queue [`EngineEvent`]s while they run; the engine hands the
//! queue to subscribers once the operation has finished, so a listener always
//! observes a consistent engine.

use serde::Serialize;

use crate::channel::Channel;
use crate::playlist::TrackInfo;

/// Something a UI may want to redraw for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The current music track changed.
    TrackChanged(TrackInfo),
    /// Music started or stopped sounding.
    PlayStateChanged(bool),
    /// The ambient loop started or stopped sounding.
    AmbientStateChanged(bool),
    /// A channel's slider value changed.
    VolumeChanged {
        /// Channel
        channel: Channel,
        /// New slider value
        volume: f32,
    },
    /// A channel's mute flag changed.
    MuteChanged {
        /// Channel
        channel: Channel,
        /// New mute flag
        muted: bool,
    },
    /// The autoplay gate opened.
    Unlocked,
}

impl EngineEvent {
    /// Event name as used by the JS `on(kind, fn)` API.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::TrackChanged(_) => "trackChange",
            EngineEvent::PlayStateChanged(_) => "playStateChange",
            EngineEvent::AmbientStateChanged(_) => "ambientStateChange",
            EngineEvent::VolumeChanged { .. } => "volumeChange",
            EngineEvent::MuteChanged { .. } => "muteChange",
            EngineEvent::Unlocked => "unlock",
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// Registered listeners, called in subscription order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventBus {
    /// No listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver events to every listener.
    pub fn dispatch(&mut self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(&event);
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
