// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Captured note events and the loop they form.

use std::time::Duration;

use crate::bus::{Message, NoteEvent};

/// Whether a recorded event started or stopped a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Stop,
}

/// A note event captured during recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    /// Note identifier
    pub note: String,
    /// Frequency in Hz
    pub frequency: f64,
    /// Time from recording start
    pub offset: Duration,
}

impl RecordedEvent {
    /// Capture a live note event at `offset`
    pub fn capture(kind: EventKind, event: &NoteEvent, offset: Duration) -> Self {
        Self {
            kind,
            note: event.note.clone(),
            frequency: event.frequency,
            offset,
        }
    }

    /// The synthetic message replaying this event
    pub fn playback_message(&self) -> Message {
        let event = NoteEvent::new(self.note.clone(), self.frequency);
        match self.kind {
            EventKind::Start => Message::PlaybackNotePressed(event),
            EventKind::Stop => Message::PlaybackNoteReleased(event),
        }
    }
}

/// Ordered sequence of recorded events forming one playback cycle.
///
/// Append order is temporal order because offsets are taken from a
/// monotonic clock at capture time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loop {
    events: Vec<RecordedEvent>,
}

impl Loop {
    /// Create an empty loop
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a captured event
    pub fn push(&mut self, event: RecordedEvent) {
        self.events.push(event);
    }

    /// Forget every event
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Recorded events in capture order
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Largest offset in the loop, zero when empty
    pub fn cycle_duration(&self) -> Duration {
        self.events
            .iter()
            .map(|event| event.offset)
            .max()
            .unwrap_or_default()
    }
}
