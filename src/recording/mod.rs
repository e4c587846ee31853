// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Loop recording and playback.
//!
//! This module provides:
//! - Note capture with offsets from the start of recording
//! - Cyclic replay of the captured loop on one-shot timers
//! - Bulk cancellation of every armed playback timer

pub mod capture;
pub mod engine;
pub mod pending;

pub use capture::{EventKind, Loop, RecordedEvent};
pub use engine::{LoopEngine, Phase, DEFAULT_LOOP_GAP, MIN_LOOP_GAP};
pub use pending::PendingCallbackSet;
