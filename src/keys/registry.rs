// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Note-id to handle lookup, driven by playback events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::NoteHandle;
use crate::bus::{EventBus, Message, SubscriptionId, Topic};

type KeyMap = HashMap<String, Rc<dyn NoteHandle>>;

/// Routes `playback:notePressed` / `playback:noteReleased` to the handle
/// registered for the note, so replayed notes take the same path as live ones
pub struct KeyRegistry {
    keys: Rc<RefCell<KeyMap>>,
    bus: Rc<EventBus>,
    subscriptions: Vec<(Topic, SubscriptionId)>,
}

impl KeyRegistry {
    /// Create an empty registry listening on `bus`
    pub fn new(bus: Rc<EventBus>) -> Self {
        let keys: Rc<RefCell<KeyMap>> = Rc::new(RefCell::new(HashMap::new()));

        let subscriptions = [Topic::PlaybackNotePressed, Topic::PlaybackNoteReleased]
            .into_iter()
            .map(|topic| {
                let keys = Rc::clone(&keys);
                let id = bus.subscribe(topic, move |message| Self::dispatch(&keys, message));
                (topic, id)
            })
            .collect();

        Self {
            keys,
            bus,
            subscriptions,
        }
    }

    fn dispatch(keys: &RefCell<KeyMap>, message: &Message) {
        let Some(event) = message.note() else {
            return;
        };
        // Release the map before calling out, the handle may register keys
        let handle = keys.borrow().get(&event.note).cloned();
        match (handle, message) {
            (Some(handle), Message::PlaybackNotePressed(_)) => handle.play(),
            (Some(handle), Message::PlaybackNoteReleased(_)) => handle.stop(),
            (None, _) => trace!(note = %event.note, "no key registered for note"),
            _ => {}
        }
    }

    /// Associate a note with its handle, replacing any previous one
    pub fn register(&self, note: impl Into<String>, handle: Rc<dyn NoteHandle>) {
        self.keys.borrow_mut().insert(note.into(), handle);
    }

    /// Find the handle for a note
    pub fn resolve(&self, note: &str) -> Option<Rc<dyn NoteHandle>> {
        self.keys.borrow().get(note).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }

    /// Registered note names, sorted
    pub fn notes(&self) -> Vec<String> {
        let mut notes: Vec<String> = self.keys.borrow().keys().cloned().collect();
        notes.sort();
        notes
    }

    /// Stop listening to the bus. Registered handles are kept.
    pub fn detach(&mut self) {
        for (topic, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(topic, id);
        }
    }
}

impl Drop for KeyRegistry {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("notes", &self.notes())
            .field("attached", &!self.subscriptions.is_empty())
            .finish()
    }
}
