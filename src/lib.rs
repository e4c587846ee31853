// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! KEYLOOP - a playable keyboard with a loop recorder.
//!
//! Keys publish note events on an [`bus::EventBus`]. The
//! [`recording::LoopEngine`] records them while armed and then replays them
//! forever on one-shot timers until the loop is cleared. Replayed notes go
//! back over the bus to the [`keys::KeyRegistry`], which sounds the same
//! handle a live key press would.

pub mod bus;
pub mod config;
pub mod control;
pub mod instrument;
pub mod keys;
pub mod recording;
pub mod timing;

pub use bus::{EngineState, EventBus, Message, NoteEvent, Topic};
pub use config::AppConfig;
pub use instrument::Instrument;
pub use recording::LoopEngine;
