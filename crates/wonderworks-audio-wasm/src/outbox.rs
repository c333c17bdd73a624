//! Ordered hand-off of engine events to JS listeners

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wonderworks_audio::EngineEvent;

/// Events waiting for delivery.
///
/// A listener may call back into the handle, which queues more events and
/// asks for another delivery. That nested request returns at once; the
/// outer [`Outbox::drain`] picks the new events up after the ones it already
/// holds, so listeners always see events in the order they were raised.
#[derive(Default)]
pub(crate) struct Outbox {
    queue: Rc<RefCell<Vec<EngineEvent>>>,
    draining: Cell<bool>,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Handle the engine subscriber pushes into.
    pub(crate) fn sink(&self) -> Rc<RefCell<Vec<EngineEvent>>> {
        Rc::clone(&self.queue)
    }

    /// Hand every queued event to `deliver`, including events queued by
    /// `deliver` itself.
    pub(crate) fn drain(&self, mut deliver: impl FnMut(&EngineEvent)) {
        if self.draining.replace(true) {
            return;
        }
        loop {
            let batch: Vec<EngineEvent> = self.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            for event in &batch {
                deliver(event);
            }
        }
        self.draining.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_from_listeners_follow_older_events() {
        let outbox = Outbox::new();
        let sink = outbox.sink();
        sink.borrow_mut().extend([
            EngineEvent::PlayStateChanged(true),
            EngineEvent::AmbientStateChanged(true),
        ]);

        let mut seen = Vec::new();
        outbox.drain(|event| {
            seen.push(event.clone());
            if *event == EngineEvent::PlayStateChanged(true) {
                // A listener pausing the music from inside the callback.
                sink.borrow_mut().push(EngineEvent::PlayStateChanged(false));
                outbox.drain(|_| panic!("nested drain must defer to the outer one"));
            }
        });

        assert_eq!(
            seen,
            [
                EngineEvent::PlayStateChanged(true),
                EngineEvent::AmbientStateChanged(true),
                EngineEvent::PlayStateChanged(false),
            ]
        );
        assert!(sink.borrow().is_empty());
    }

    #[test]
    fn test_drain_can_run_again_afterwards() {
        let outbox = Outbox::new();
        outbox.sink().borrow_mut().push(EngineEvent::Unlocked);
        let mut count = 0;
        outbox.drain(|_| count += 1);
        outbox.sink().borrow_mut().push(EngineEvent::Unlocked);
        outbox.drain(|_| count += 1);
        assert_eq!(count, 2);
    }
}
