// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playable keyboard.
//!
//! Each key owns a note handle. Pressing a key sounds its handle directly
//! and announces the note on the bus so the loop engine can record it.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{KeyRegistry, NoteHandle};
use crate::bus::{EventBus, Message, NoteEvent};
use crate::config::KeyConfig;

struct Key {
    config: KeyConfig,
    handle: Rc<dyn NoteHandle>,
}

impl Key {
    fn event(&self) -> NoteEvent {
        NoteEvent::new(self.config.name.clone(), self.config.frequency)
    }
}

/// Note source built from a key layout
pub struct Keyboard {
    keys: Vec<Key>,
    bus: Rc<EventBus>,
}

impl Keyboard {
    /// Build a keyboard, creating one handle per key with `make_handle` and
    /// registering it so replayed notes reach the same handle
    pub fn new<F>(
        layout: &[KeyConfig],
        bus: Rc<EventBus>,
        registry: &KeyRegistry,
        mut make_handle: F,
    ) -> Self
    where
        F: FnMut(&KeyConfig) -> Rc<dyn NoteHandle>,
    {
        let keys = layout
            .iter()
            .map(|config| {
                let handle = make_handle(config);
                registry.register(config.name.clone(), Rc::clone(&handle));
                Key {
                    config: config.clone(),
                    handle,
                }
            })
            .collect();

        Self { keys, bus }
    }

    /// Key layout, lowest key first
    pub fn layout(&self) -> impl Iterator<Item = &KeyConfig> {
        self.keys.iter().map(|key| &key.config)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Press the key bound to a typed character. Returns false when no key
    /// uses that hint.
    pub fn press_hint(&self, c: char) -> bool {
        self.find(|key| key.config.matches_hint(c))
            .map(|key| self.key_down(key))
            .is_some()
    }

    /// Release the key bound to a typed character
    pub fn release_hint(&self, c: char) -> bool {
        self.find(|key| key.config.matches_hint(c))
            .map(|key| self.key_up(key))
            .is_some()
    }

    /// Press a key by note name
    pub fn press(&self, note: &str) -> bool {
        self.find(|key| key.config.name == note)
            .map(|key| self.key_down(key))
            .is_some()
    }

    /// Release a key by note name
    pub fn release(&self, note: &str) -> bool {
        self.find(|key| key.config.name == note)
            .map(|key| self.key_up(key))
            .is_some()
    }

    fn find(&self, predicate: impl Fn(&Key) -> bool) -> Option<&Key> {
        self.keys.iter().find(|key| predicate(key))
    }

    fn key_down(&self, key: &Key) {
        trace!(note = %key.config.name, "key down");
        key.handle.play();
        self.bus.publish(&Message::NotePressed(key.event()));
    }

    fn key_up(&self, key: &Key) {
        trace!(note = %key.config.name, "key up");
        key.handle.stop();
        self.bus.publish(&Message::NoteReleased(key.event()));
    }
}

impl fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.keys.iter().map(|k| k.config.name.as_str()).collect();
        f.debug_struct("Keyboard").field("keys", &names).finish()
    }
}
