//! Autoplay unlock gate
//!
//! Browsers keep the audio output suspended until the page sees a user
//! gesture. The gate turns the first qualifying gesture into a resume request
//! and reports once the output is actually running; after that it is open for
//! good. A refused resume leaves the gate locked until the next gesture.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::backend::{AudioBackend, OutputState};

/// Gate progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for a gesture.
    Locked,
    /// Resume requested, output not running yet.
    Resuming,
    /// Output running; deferred intent may be flushed.
    Unlocked,
}

/// A user input that browsers accept as permission to play audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// `click`
    Click,
    /// `keydown`
    KeyDown,
    /// `touchstart`
    TouchStart,
    /// `pointerdown`
    PointerDown,
}

impl Gesture {
    /// Every gesture the gate listens for.
    pub const ALL: [Gesture; 4] = [
        Gesture::Click,
        Gesture::KeyDown,
        Gesture::TouchStart,
        Gesture::PointerDown,
    ];

    /// DOM event name.
    pub const fn event_name(self) -> &'static str {
        match self {
            Gesture::Click => "click",
            Gesture::KeyDown => "keydown",
            Gesture::TouchStart => "touchstart",
            Gesture::PointerDown => "pointerdown",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

impl FromStr for Gesture {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .into_iter()
            .find(|g| g.event_name() == s)
            .ok_or(())
    }
}

/// One-time transition from "no audio allowed" to "audio allowed".
#[derive(Debug, Clone)]
pub struct UnlockGate {
    state: GateState,
}

impl Default for UnlockGate {
    fn default() -> Self {
        Self::new()
    }
}

impl UnlockGate {
    /// Locked gate.
    pub fn new() -> Self {
        Self {
            state: GateState::Locked,
        }
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// True once the gate has opened.
    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Handle a gesture. Returns `true` if this call opened the gate.
    pub fn on_gesture<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, gesture: Gesture) -> bool {
        if self.is_unlocked() {
            return false;
        }
        match backend.output_state() {
            OutputState::Closed => {
                warn!(%gesture, "audio output closed, cannot unlock");
                false
            }
            OutputState::Running => self.open(gesture),
            OutputState::Suspended => match backend.resume() {
                Ok(()) if backend.output_state() == OutputState::Running => self.open(gesture),
                Ok(()) => {
                    self.state = GateState::Resuming;
                    false
                }
                Err(e) => {
                    warn!(%gesture, error = %e, "unlock failed, waiting for next gesture");
                    self.state = GateState::Locked;
                    false
                }
            },
        }
    }

    /// Complete a pending resume. Returns `true` if this call opened the gate.
    pub fn poll<B: AudioBackend + ?Sized>(&mut self, backend: &B) -> bool {
        if self.state == GateState::Resuming && backend.output_state() == OutputState::Running {
            self.state = GateState::Unlocked;
            info!("audio output unlocked");
            return true;
        }
        false
    }

    fn open(&mut self, gesture: Gesture) -> bool {
        self.state = GateState::Unlocked;
        info!(%gesture, "audio output unlocked");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessBackend, ResumeMode};

    #[test]
    fn test_gesture_names() {
        assert_eq!("touchstart".parse::<Gesture>(), Ok(Gesture::TouchStart));
        assert!("scroll".parse::<Gesture>().is_err());
        assert_eq!(Gesture::KeyDown.to_string(), "keydown");
    }

    #[test]
    fn test_unlocks_once() {
        let mut backend = HeadlessBackend::new();
        let mut gate = UnlockGate::new();
        assert!(gate.on_gesture(&mut backend, Gesture::Click));
        assert!(gate.is_unlocked());
        assert!(!gate.on_gesture(&mut backend, Gesture::KeyDown));
        assert_eq!(backend.resume_calls(), 1);
    }

    #[test]
    fn test_deferred_resume_completes_on_poll() {
        let mut backend = HeadlessBackend::new().with_resume_mode(ResumeMode::Deferred);
        let mut gate = UnlockGate::new();
        assert!(!gate.on_gesture(&mut backend, Gesture::TouchStart));
        assert_eq!(gate.state(), GateState::Resuming);
        assert!(!gate.poll(&backend));
        backend.finish_resume();
        assert!(gate.poll(&backend));
        assert!(!gate.poll(&backend));
    }

    #[test]
    fn test_failed_resume_retries_on_next_gesture() {
        let mut backend = HeadlessBackend::new().with_resume_mode(ResumeMode::Fail);
        let mut gate = UnlockGate::new();
        assert!(!gate.on_gesture(&mut backend, Gesture::Click));
        assert_eq!(gate.state(), GateState::Locked);

        backend.set_resume_mode(ResumeMode::Immediate);
        assert!(gate.on_gesture(&mut backend, Gesture::PointerDown));
        assert_eq!(backend.resume_calls(), 2);
    }
}
