// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keys: where notes come from and where replayed notes go.
//!
//! This module provides:
//! - [`Keyboard`], the note source that turns hint keys into bus events
//! - [`KeyRegistry`], the note sink that routes playback events to tones
//! - [`NoteHandle`], the seam to whatever actually makes the sound

pub mod keyboard;
pub mod registry;
pub mod tone;

pub use keyboard::Keyboard;
pub use registry::KeyRegistry;
pub use tone::LoggedTone;

/// Something that can sound and silence one note.
///
/// Implementations should treat `play` on a sounding note and `stop` on a
/// silent note as no-ops.
pub trait NoteHandle {
    fn play(&self);
    fn stop(&self);
}
