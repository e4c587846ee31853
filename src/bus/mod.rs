// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Publish/subscribe event bus.
//!
//! The bus decouples note sources, the loop engine, the key registry and the
//! transport controls. It is created once by the composition root and shared
//! as `Rc<EventBus>`; everything runs on one thread.
//!
//! Dispatch is synchronous and in registration order. The handler list for a
//! topic is snapshotted before dispatch, so handlers may publish, subscribe
//! or unsubscribe re-entrantly; changes made during a dispatch take effect on
//! the next publish.

pub mod message;

pub use message::{EngineState, Message, NoteEvent, PayloadError, Topic};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

type Handler = Rc<dyn Fn(&Message)>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    handlers: HashMap<Topic, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

/// Single-threaded pub/sub hub
#[derive(Default)]
pub struct EventBus {
    registry: RefCell<Registry>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(topic)
            .or_default()
            .push((id, Rc::new(handler)));
        trace!(%topic, ?id, "subscribed");
        id
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) {
        let mut registry = self.registry.borrow_mut();
        if let Some(handlers) = registry.handlers.get_mut(&topic) {
            handlers.retain(|(existing, _)| *existing != id);
            if handlers.is_empty() {
                registry.handlers.remove(&topic);
            }
        }
    }

    /// Deliver a message to every handler registered for its topic
    pub fn publish(&self, message: &Message) {
        let topic = message.topic();
        let handlers: Vec<Handler> = match self.registry.borrow().handlers.get(&topic) {
            Some(handlers) => handlers.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => return,
        };

        trace!(%topic, subscribers = handlers.len(), "publish");
        for handler in handlers {
            handler(message);
        }
    }

    /// Number of handlers currently registered for a topic
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .borrow()
            .handlers
            .get(&topic)
            .map_or(0, Vec::len)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.registry.borrow_mut().handlers.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut counts: Vec<(&'static str, usize)> = registry
            .handlers
            .iter()
            .map(|(topic, handlers)| (topic.name(), handlers.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}
