// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bus topics and their payloads.
//!
//! Every topic carries exactly one payload shape, so messages are a closed
//! enum with one variant per topic rather than a string key plus an untyped
//! payload.

use std::fmt;

use thiserror::Error;

/// Bus topic identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A live key went down
    NotePressed,
    /// A live key came up
    NoteReleased,
    /// The loop engine replayed a key press
    PlaybackNotePressed,
    /// The loop engine replayed a key release
    PlaybackNoteReleased,
    /// Transport: begin recording
    LoopStart,
    /// Transport: stop recording and start looping
    LoopStop,
    /// Transport: stop everything and forget the loop
    LoopClear,
    /// Engine state projection after a transition
    StateChanged,
}

impl Topic {
    /// All topics, in declaration order
    pub const ALL: [Topic; 8] = [
        Topic::NotePressed,
        Topic::NoteReleased,
        Topic::PlaybackNotePressed,
        Topic::PlaybackNoteReleased,
        Topic::LoopStart,
        Topic::LoopStop,
        Topic::LoopClear,
        Topic::StateChanged,
    ];

    /// Logical topic name as seen by external components
    pub fn name(&self) -> &'static str {
        match self {
            Topic::NotePressed => "note:pressed",
            Topic::NoteReleased => "note:released",
            Topic::PlaybackNotePressed => "playback:notePressed",
            Topic::PlaybackNoteReleased => "playback:noteReleased",
            Topic::LoopStart => "loop:start",
            Topic::LoopStop => "loop:stop",
            Topic::LoopClear => "loop:clear",
            Topic::StateChanged => "state:changed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a note payload is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("note event has an empty note identifier")]
    EmptyNote,
    #[error("note {note:?} has invalid frequency {frequency}")]
    InvalidFrequency { note: String, frequency: f64 },
}

/// A note identifier plus the frequency it sounds at
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Note identifier (e.g. "C#4")
    pub note: String,
    /// Frequency in Hz, always positive
    pub frequency: f64,
}

impl NoteEvent {
    /// Create a new note event
    pub fn new(note: impl Into<String>, frequency: f64) -> Self {
        Self {
            note: note.into(),
            frequency,
        }
    }

    /// Check that the payload is usable: a non-empty note and a finite,
    /// positive frequency
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.note.trim().is_empty() {
            return Err(PayloadError::EmptyNote);
        }
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(PayloadError::InvalidFrequency {
                note: self.note.clone(),
                frequency: self.frequency,
            });
        }
        Ok(())
    }
}

/// Externally observable projection of the loop engine's state.
///
/// `is_recording` and `is_playing` are never both true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineState {
    pub is_recording: bool,
    pub is_playing: bool,
    pub has_loop: bool,
}

/// A message published on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NotePressed(NoteEvent),
    NoteReleased(NoteEvent),
    PlaybackNotePressed(NoteEvent),
    PlaybackNoteReleased(NoteEvent),
    LoopStart,
    LoopStop,
    LoopClear,
    StateChanged(EngineState),
}

impl Message {
    /// The topic this message is delivered on
    pub fn topic(&self) -> Topic {
        match self {
            Message::NotePressed(_) => Topic::NotePressed,
            Message::NoteReleased(_) => Topic::NoteReleased,
            Message::PlaybackNotePressed(_) => Topic::PlaybackNotePressed,
            Message::PlaybackNoteReleased(_) => Topic::PlaybackNoteReleased,
            Message::LoopStart => Topic::LoopStart,
            Message::LoopStop => Topic::LoopStop,
            Message::LoopClear => Topic::LoopClear,
            Message::StateChanged(_) => Topic::StateChanged,
        }
    }

    /// The note payload, for the four note topics
    pub fn note(&self) -> Option<&NoteEvent> {
        match self {
            Message::NotePressed(event)
            | Message::NoteReleased(event)
            | Message::PlaybackNotePressed(event)
            | Message::PlaybackNoteReleased(event) => Some(event),
            _ => None,
        }
    }

    /// The state payload, for `state:changed`
    pub fn state(&self) -> Option<EngineState> {
        match self {
            Message::StateChanged(state) => Some(*state),
            _ => None,
        }
    }
}
