// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! A stand-in tone that logs instead of synthesizing.

use std::cell::Cell;

use tracing::info;

use super::NoteHandle;
use crate::config::KeyConfig;

/// Tracks whether its note is sounding and logs every change
#[derive(Debug)]
pub struct LoggedTone {
    name: String,
    frequency: f64,
    sounding: Cell<bool>,
    plays: Cell<u32>,
}

impl LoggedTone {
    pub fn new(key: &KeyConfig) -> Self {
        Self {
            name: key.name.clone(),
            frequency: key.frequency,
            sounding: Cell::new(false),
            plays: Cell::new(0),
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding.get()
    }

    /// How many times the note has started sounding
    pub fn plays(&self) -> u32 {
        self.plays.get()
    }
}

impl NoteHandle for LoggedTone {
    fn play(&self) {
        if self.sounding.replace(true) {
            return;
        }
        self.plays.set(self.plays.get() + 1);
        info!(note = %self.name, frequency = self.frequency, "note on");
    }

    fn stop(&self) {
        if self.sounding.replace(false) {
            info!(note = %self.name, "note off");
        }
    }
}
