// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Composition root.
//!
//! Builds the bus and every component that hangs off it, in dependency
//! order. Nothing here is global: each [`Instrument`] owns its own bus.

use std::rc::Rc;

use tracing::info;

use crate::bus::EventBus;
use crate::config::{AppConfig, ConfigError, KeyConfig};
use crate::control::TransportControls;
use crate::keys::{KeyRegistry, Keyboard, NoteHandle};
use crate::recording::LoopEngine;
use crate::timing::{Clock, Timer};

/// A fully wired keyboard with loop recorder
#[derive(Debug)]
pub struct Instrument {
    pub bus: Rc<EventBus>,
    pub registry: KeyRegistry,
    pub keyboard: Keyboard,
    pub engine: LoopEngine,
    pub transport: TransportControls,
}

impl Instrument {
    /// Wire an instrument from configuration, using `make_handle` to build
    /// the tone behind each key. The configuration is validated first.
    pub fn new<F>(
        config: &AppConfig,
        clock: Rc<dyn Clock>,
        timer: Rc<dyn Timer>,
        make_handle: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnMut(&KeyConfig) -> Rc<dyn NoteHandle>,
    {
        config.validate()?;

        let bus = Rc::new(EventBus::new());
        let registry = KeyRegistry::new(Rc::clone(&bus));
        let keyboard = Keyboard::new(&config.keys, Rc::clone(&bus), &registry, make_handle);
        let engine = LoopEngine::with_gap(Rc::clone(&bus), clock, timer, config.loop_timing.gap());
        let transport = TransportControls::new(Rc::clone(&bus));

        info!(
            keys = keyboard.len(),
            gap_ms = config.loop_timing.gap_ms,
            "instrument ready"
        );

        Ok(Self {
            bus,
            registry,
            keyboard,
            engine,
            transport,
        })
    }
}

impl Drop for Instrument {
    fn drop(&mut self) {
        self.bus.clear();
    }
}
