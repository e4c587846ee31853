// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport controls for the loop engine.
//!
//! A single button cycles through the loop workflow: start recording, stop
//! recording (which starts looping), clear the loop. What the button does
//! next is decided from the last `state:changed` broadcast, never from a
//! local guess, so the control always mirrors the engine.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::bus::{EngineState, EventBus, Message, SubscriptionId, Topic};

/// Command the transport button sends next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    Start,
    Stop,
    Clear,
}

impl TransportAction {
    /// Choose the action for an engine state
    pub fn for_state(state: EngineState) -> Self {
        if state.is_recording {
            TransportAction::Stop
        } else if state.is_playing {
            TransportAction::Clear
        } else {
            TransportAction::Start
        }
    }

    /// Button caption
    pub fn label(&self) -> &'static str {
        match self {
            TransportAction::Start => "Start Loop",
            TransportAction::Stop => "Stop Recording",
            TransportAction::Clear => "Clear Loop",
        }
    }

    /// The bus command for this action
    pub fn message(&self) -> Message {
        match self {
            TransportAction::Start => Message::LoopStart,
            TransportAction::Stop => Message::LoopStop,
            TransportAction::Clear => Message::LoopClear,
        }
    }
}

/// One-button loop transport
pub struct TransportControls {
    state: Rc<Cell<EngineState>>,
    bus: Rc<EventBus>,
    subscription: SubscriptionId,
}

impl TransportControls {
    /// Create the control and start mirroring engine state from `bus`
    pub fn new(bus: Rc<EventBus>) -> Self {
        let state = Rc::new(Cell::new(EngineState::default()));

        let mirror = Rc::clone(&state);
        let subscription = bus.subscribe(Topic::StateChanged, move |message| {
            if let Some(next) = message.state() {
                mirror.set(next);
            }
        });

        Self {
            state,
            bus,
            subscription,
        }
    }

    /// Last state broadcast by the engine
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    pub fn next_action(&self) -> TransportAction {
        TransportAction::for_state(self.state())
    }

    /// Current button caption
    pub fn label(&self) -> &'static str {
        self.next_action().label()
    }

    /// Click the button: publish the command for the current state
    pub fn press(&self) -> TransportAction {
        let action = self.next_action();
        debug!(?action, "transport pressed");
        self.bus.publish(&action.message());
        action
    }

    /// Keyboard shortcut: space presses the button. Returns whether the key
    /// was consumed.
    pub fn handle_key(&self, c: char) -> bool {
        if c == ' ' {
            self.press();
            true
        } else {
            false
        }
    }
}

impl Drop for TransportControls {
    fn drop(&mut self) {
        self.bus.unsubscribe(Topic::StateChanged, self.subscription);
    }
}

impl fmt::Debug for TransportControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportControls")
            .field("state", &self.state())
            .field("label", &self.label())
            .finish()
    }
}
